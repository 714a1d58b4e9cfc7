//! On-screen pointer marker.
//!
//! Coordinate events set a [`MarkerTarget`] in viewport pixels; a fixed-rate
//! loop moves the displayed [`MarkerPosition`] toward it with exponential
//! smoothing, independently of how often targets arrive.

/// Blend factor applied on every interpolation tick.
pub const SMOOTHING: f64 = 0.35;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarkerTarget {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarkerPosition {
    pub x: f64,
    pub y: f64,
}

impl MarkerPosition {
    pub fn distance_to(&self, target: &MarkerTarget) -> f64 {
        (target.x - self.x).hypot(target.y - self.y)
    }
}

/// Placement of the output canvas on screen.
///
/// `backing_*` is the canvas's pixel resolution (processing space);
/// `display_*` its laid-out size and `left`/`top` its viewport offset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasGeometry {
    pub backing_width: u32,
    pub backing_height: u32,
    pub display_width: f64,
    pub display_height: f64,
    pub left: f64,
    pub top: f64,
}

impl CanvasGeometry {
    /// Convert a processing-space coordinate into viewport pixels.
    ///
    /// An unsized canvas maps coordinates unchanged.
    pub fn project(&self, x: f64, y: f64) -> MarkerTarget {
        let scale_x = ratio(self.display_width, self.backing_width);
        let scale_y = ratio(self.display_height, self.backing_height);
        MarkerTarget {
            x: x * scale_x + self.left,
            y: y * scale_y + self.top,
        }
    }
}

fn ratio(display: f64, backing: u32) -> f64 {
    if backing == 0 || display <= 0.0 {
        1.0
    } else {
        display / f64::from(backing)
    }
}

/// Target plus interpolated position.
#[derive(Clone, Debug, Default)]
pub struct MarkerProjector {
    target: Option<MarkerTarget>,
    position: MarkerPosition,
}

impl MarkerProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, target: MarkerTarget) {
        self.target = Some(target);
    }

    /// Continue from an earlier position, keeping its target if any.
    pub fn resume(position: MarkerPosition, target: Option<MarkerTarget>) -> Self {
        Self { target, position }
    }

    pub fn target(&self) -> Option<MarkerTarget> {
        self.target
    }

    pub fn position(&self) -> MarkerPosition {
        self.position
    }

    /// Advance one interpolation step. Holds still until a target exists.
    pub fn tick(&mut self) -> MarkerPosition {
        if let Some(target) = self.target {
            self.position.x += (target.x - self.position.x) * SMOOTHING;
            self.position.y += (target.y - self.position.y) * SMOOTHING;
        }
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsized_canvas_projects_identity() {
        let target = CanvasGeometry::default().project(120.5, 340.2);
        assert_eq!(target, MarkerTarget { x: 120.5, y: 340.2 });
    }

    #[test]
    fn projection_scales_and_offsets() {
        let geometry = CanvasGeometry {
            backing_width: 1280,
            backing_height: 720,
            display_width: 640.0,
            display_height: 360.0,
            left: 10.0,
            top: 20.0,
        };
        let target = geometry.project(640.0, 360.0);
        assert_eq!(target, MarkerTarget { x: 330.0, y: 200.0 });
    }

    #[test]
    fn holds_position_without_target() {
        let mut projector = MarkerProjector::new();
        assert_eq!(projector.tick(), MarkerPosition::default());
    }

    #[test]
    fn first_tick_blends_by_fixed_factor() {
        let mut projector = MarkerProjector::new();
        projector.set_target(MarkerTarget { x: 100.0, y: -20.0 });
        let p = projector.tick();
        assert!((p.x - 35.0).abs() < 1e-9);
        assert!((p.y + 7.0).abs() < 1e-9);
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let mut projector = MarkerProjector::new();
        let target = MarkerTarget { x: 800.0, y: 450.0 };
        projector.set_target(target);

        let mut previous = projector.position().distance_to(&target);
        for _ in 0..60 {
            let p = projector.tick();
            let distance = p.distance_to(&target);
            assert!(distance < previous);
            assert!(p.x <= target.x && p.y <= target.y);
            previous = distance;
        }
        assert!(previous < 1e-6);
    }
}
