//! Per-frame compositing of subject, matte and background.
//!
//! The capture-and-segment engine is external; it hands over one
//! `(frame, matte)` pair per frame and this pipeline decides what ends up on
//! the output canvas:
//!
//! 1. Frames with a zero dimension are skipped.
//! 2. With the subject visible, the frame is drawn mirrored (and scaled about
//!    the centre by the subject scale), then the matte is applied with
//!    destination-atop so only matte-opaque subject pixels remain.
//! 3. The background is always composited behind with destination-over.
//!
//! The subject style is read from a `watch` channel on every frame, so a toggle
//! shows up on the next rendered frame.

use client_core::{Matte, SubjectStyle, VideoFrame};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tokio::sync::watch;
use tracing::{debug, trace};

pub struct SegmentationPipeline {
    style: watch::Receiver<SubjectStyle>,
    background: Option<RgbaImage>,
    /// Background resized to the last output size.
    fitted: Option<RgbaImage>,
    output: Option<RgbaImage>,
    rendered: u64,
}

impl SegmentationPipeline {
    pub fn new(style: watch::Receiver<SubjectStyle>) -> Self {
        Self {
            style,
            background: None,
            fitted: None,
            output: None,
            rendered: 0,
        }
    }

    /// Replace the background image. Empty images clear it.
    pub fn set_background(&mut self, background: Option<RgbaImage>) {
        self.background = background.filter(|b| b.width() > 0 && b.height() > 0);
        self.fitted = None;
        debug!(present = self.background.is_some(), "Background updated");
    }

    /// Composite one frame. Returns `false` when the frame was skipped.
    pub fn render(&mut self, frame: &VideoFrame, matte: &Matte) -> bool {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            trace!("Skipping frame from unready source");
            return false;
        }

        let style = *self.style.borrow();
        let mut canvas = RgbaImage::new(width, height);
        if style.visible && matte.width() > 0 && matte.height() > 0 {
            draw_subject(&mut canvas, frame, matte, style.scale);
        }
        if let Some(background) = self.fitted_background(width, height) {
            for (dst, src) in canvas.pixels_mut().zip(background.pixels()) {
                *dst = destination_over(*dst, *src);
            }
        }

        self.output = Some(canvas);
        self.rendered += 1;
        true
    }

    /// Whether at least one frame has been composited.
    pub fn has_rendered(&self) -> bool {
        self.rendered > 0
    }

    pub fn frames_rendered(&self) -> u64 {
        self.rendered
    }

    /// Most recent composited canvas.
    pub fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }

    fn fitted_background(&mut self, width: u32, height: u32) -> Option<&RgbaImage> {
        let source = self.background.as_ref()?;
        let stale = self
            .fitted
            .as_ref()
            .is_none_or(|f| f.dimensions() != (width, height));
        if stale {
            self.fitted = Some(if source.dimensions() == (width, height) {
                source.clone()
            } else {
                imageops::resize(source, width, height, FilterType::Triangle)
            });
        }
        self.fitted.as_ref()
    }
}

/// Draw the mirrored, scaled subject and cut it out with the matte.
fn draw_subject(canvas: &mut RgbaImage, frame: &VideoFrame, matte: &Matte, scale: f32) {
    let (width, height) = frame.dimensions();
    let drawn_w = f64::from(width) * f64::from(scale);
    let drawn_h = f64::from(height) * f64::from(scale);
    let left = (f64::from(width) - drawn_w) / 2.0;
    let top = (f64::from(height) - drawn_h) / 2.0;

    for (x, y, dst) in canvas.enumerate_pixels_mut() {
        let u = (f64::from(x) + 0.5 - left) / drawn_w;
        let v = (f64::from(y) + 0.5 - top) / drawn_h;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            continue;
        }
        // Mirror horizontally; the matte shares the frame's transform.
        let u = 1.0 - u;
        let subject = *frame.get_pixel(texel(u, width), texel(v, height));
        let coverage = matte.get_pixel(texel(u, matte.width()), texel(v, matte.height()))[0];
        *dst = destination_atop(subject, f32::from(coverage) / 255.0);
    }
}

fn texel(t: f64, extent: u32) -> u32 {
    ((t * f64::from(extent)) as u32).min(extent.saturating_sub(1))
}

/// Porter-Duff destination-atop with a black source of alpha `src_alpha`.
fn destination_atop(dst: Rgba<u8>, src_alpha: f32) -> Rgba<u8> {
    if src_alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let channel = |c: u8| to_u8(f32::from(c) * dst_alpha);
    Rgba([
        channel(dst[0]),
        channel(dst[1]),
        channel(dst[2]),
        to_u8(src_alpha * 255.0),
    ])
}

/// Porter-Duff destination-over on straight-alpha pixels.
fn destination_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let src_alpha = f32::from(src[3]) / 255.0;
    let out_alpha = dst_alpha + src_alpha * (1.0 - dst_alpha);
    if out_alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |d: u8, s: u8| {
        let premultiplied = f32::from(d) * dst_alpha + f32::from(s) * src_alpha * (1.0 - dst_alpha);
        to_u8(premultiplied / out_alpha)
    };
    Rgba([
        channel(dst[0], src[0]),
        channel(dst[1], src[1]),
        channel(dst[2], src[2]),
        to_u8(out_alpha * 255.0),
    ])
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
