//! Document navigation state machine.
//!
//! Keyboard arrows and remote gestures are both reduced to a [`NavAction`] and
//! applied through [`NavigationController::apply`], so bounds are checked in
//! exactly one place.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use tracing::{debug, warn};

use crate::traits::FullscreenHost;

const PDF_MIME: &str = "application/pdf";
const PPT_MIME: &str = "application/vnd.ms-powerpoint";
const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Subject scale bounds and step, in tenths.
const SCALE_MIN_TENTHS: u8 = 5;
const SCALE_MAX_TENTHS: u8 = 20;
const SCALE_DEFAULT_TENTHS: u8 = 10;

/// Kind of document currently displayed behind the subject.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    None,
    Image,
    Pdf,
    Slideshow,
}

impl FileType {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.as_str() {
            PDF_MIME => FileType::Pdf,
            PPT_MIME | PPTX_MIME => FileType::Slideshow,
            m if m.starts_with("image/") => FileType::Image,
            _ => FileType::None,
        }
    }
}

/// Position within the displayed document.
///
/// Invariants: `1 <= pdf_page_num <= max(total_pdf_pages, 1)` and
/// `ppt_slide_num < max(ppt_slide_count, 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavigationState {
    pub file_type: FileType,
    pub pdf_page_num: u32,
    pub total_pdf_pages: u32,
    pub ppt_slide_num: u32,
    pub ppt_slide_count: u32,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            file_type: FileType::None,
            pdf_page_num: 1,
            total_pdf_pages: 0,
            ppt_slide_num: 0,
            ppt_slide_count: 0,
        }
    }
}

/// How the live subject is composited.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubjectStyle {
    pub visible: bool,
    pub scale: f32,
}

impl Default for SubjectStyle {
    fn default() -> Self {
        Self {
            visible: true,
            scale: 1.0,
        }
    }
}

/// Canonical action, independent of the input source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    Advance,
    Retreat,
    ToggleSubject,
    ToggleFullscreen,
    ZoomIn,
    ZoomOut,
}

/// Observable effect of applying an action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    PageChanged(u32),
    SlideChanged(u32),
    SubjectVisibility(bool),
    SubjectScale(f32),
    FullscreenRequested,
    FullscreenExitRequested,
    FullscreenRejected,
    NoOp,
}

pub struct NavigationController {
    state: NavigationState,
    scale_tenths: u8,
    subject_visible: bool,
    fullscreen: bool,
    subject_label: String,
}

impl NavigationController {
    /// `subject_label` is the display label that, besides the canonical
    /// names, triggers the toggle-subject action.
    pub fn new(subject_label: impl Into<String>) -> Self {
        Self {
            state: NavigationState::default(),
            scale_tenths: SCALE_DEFAULT_TENTHS,
            subject_visible: true,
            fullscreen: false,
            subject_label: subject_label.into(),
        }
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn subject(&self) -> SubjectStyle {
        SubjectStyle {
            visible: self.subject_visible,
            scale: f32::from(self.scale_tenths) / 10.0,
        }
    }

    /// Last observed fullscreen state (not the last request).
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Replace the displayed document and rewind to its first page/slide.
    pub fn load_document(&mut self, mime: &str, extent: u32) -> FileType {
        let file_type = FileType::from_mime(mime);
        self.state = NavigationState {
            file_type,
            ..NavigationState::default()
        };
        match file_type {
            FileType::Pdf => self.state.total_pdf_pages = extent,
            FileType::Slideshow => self.state.ppt_slide_count = extent,
            FileType::Image | FileType::None => {}
        }
        debug!(?file_type, extent, "Document loaded");
        file_type
    }

    /// Map an (already remapped) gesture name to an action.
    pub fn action_for_gesture(&self, name: &str) -> Option<NavAction> {
        let normalized = name.trim().to_lowercase();
        if normalized == self.subject_label.trim().to_lowercase() {
            return Some(NavAction::ToggleSubject);
        }
        match normalized.as_str() {
            "swipe right" | "next" | "next slide" => Some(NavAction::Advance),
            "swipe left" | "previous" | "previous slide" => Some(NavAction::Retreat),
            "zoom in" => Some(NavAction::ZoomIn),
            "zoom out" => Some(NavAction::ZoomOut),
            "full screen" | "fullscreen" | "exit full screen" => Some(NavAction::ToggleFullscreen),
            "toggle person" | "show person" | "hide person" | "toggle subject" => {
                Some(NavAction::ToggleSubject)
            }
            _ => None,
        }
    }

    /// Map a keyboard event to an action. Only arrow presses navigate.
    pub fn action_for_key(key: &KeyEvent) -> Option<NavAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Right => Some(NavAction::Advance),
            KeyCode::Left => Some(NavAction::Retreat),
            _ => None,
        }
    }

    /// Apply an action. Out-of-bounds requests are silent no-ops.
    pub fn apply(&mut self, action: NavAction, host: &mut dyn FullscreenHost) -> Transition {
        match action {
            NavAction::Advance => self.advance(),
            NavAction::Retreat => self.retreat(),
            NavAction::ToggleSubject => {
                self.subject_visible = !self.subject_visible;
                Transition::SubjectVisibility(self.subject_visible)
            }
            NavAction::ZoomIn => self.rescale(1),
            NavAction::ZoomOut => self.rescale(-1),
            NavAction::ToggleFullscreen => self.toggle_fullscreen(host),
        }
    }

    /// Record the platform's fullscreen state.
    pub fn on_fullscreen_change(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    fn advance(&mut self) -> Transition {
        let s = &mut self.state;
        match s.file_type {
            FileType::Pdf if s.pdf_page_num < s.total_pdf_pages => {
                s.pdf_page_num += 1;
                Transition::PageChanged(s.pdf_page_num)
            }
            FileType::Slideshow if s.ppt_slide_num + 1 < s.ppt_slide_count => {
                s.ppt_slide_num += 1;
                Transition::SlideChanged(s.ppt_slide_num)
            }
            _ => Transition::NoOp,
        }
    }

    fn retreat(&mut self) -> Transition {
        let s = &mut self.state;
        match s.file_type {
            FileType::Pdf if s.pdf_page_num > 1 => {
                s.pdf_page_num -= 1;
                Transition::PageChanged(s.pdf_page_num)
            }
            FileType::Slideshow if s.ppt_slide_num > 0 => {
                s.ppt_slide_num -= 1;
                Transition::SlideChanged(s.ppt_slide_num)
            }
            _ => Transition::NoOp,
        }
    }

    fn rescale(&mut self, delta: i8) -> Transition {
        let next = self
            .scale_tenths
            .saturating_add_signed(delta)
            .clamp(SCALE_MIN_TENTHS, SCALE_MAX_TENTHS);
        if next == self.scale_tenths {
            return Transition::NoOp;
        }
        self.scale_tenths = next;
        Transition::SubjectScale(self.subject().scale)
    }

    fn toggle_fullscreen(&mut self, host: &mut dyn FullscreenHost) -> Transition {
        if host.is_fullscreen() {
            match host.exit_fullscreen() {
                Ok(()) => Transition::FullscreenExitRequested,
                Err(e) => {
                    warn!("Exit fullscreen failed: {}", e);
                    Transition::FullscreenRejected
                }
            }
        } else {
            match host.request_fullscreen() {
                Ok(()) => Transition::FullscreenRequested,
                Err(e) => {
                    warn!("Fullscreen request failed: {}", e);
                    Transition::FullscreenRejected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFullscreenHost;
    use crossterm::event::KeyModifiers;

    fn pdf(page: u32, total: u32) -> NavigationController {
        let mut nav = NavigationController::new("Hide person");
        nav.load_document(PDF_MIME, total);
        nav.state.pdf_page_num = page;
        nav
    }

    fn slides(count: u32) -> NavigationController {
        let mut nav = NavigationController::new("Hide person");
        nav.load_document(PPTX_MIME, count);
        nav
    }

    #[test]
    fn advance_moves_to_next_pdf_page() {
        let mut host = MockFullscreenHost::new();
        let mut nav = pdf(1, 3);
        assert_eq!(
            nav.apply(NavAction::Advance, &mut host),
            Transition::PageChanged(2)
        );
        assert_eq!(nav.state().pdf_page_num, 2);
    }

    #[test]
    fn advance_on_last_pdf_page_is_noop() {
        let mut host = MockFullscreenHost::new();
        let mut nav = pdf(3, 3);
        nav.state.ppt_slide_count = 5;
        assert_eq!(nav.apply(NavAction::Advance, &mut host), Transition::NoOp);
        assert_eq!(nav.state().pdf_page_num, 3);
        // The slide branch is never taken for a pdf.
        assert_eq!(nav.state().ppt_slide_num, 0);
    }

    #[test]
    fn slides_are_bounded_on_both_ends() {
        let mut host = MockFullscreenHost::new();
        let mut nav = slides(2);
        assert_eq!(nav.apply(NavAction::Retreat, &mut host), Transition::NoOp);
        assert_eq!(
            nav.apply(NavAction::Advance, &mut host),
            Transition::SlideChanged(1)
        );
        assert_eq!(nav.apply(NavAction::Advance, &mut host), Transition::NoOp);
        assert_eq!(
            nav.apply(NavAction::Retreat, &mut host),
            Transition::SlideChanged(0)
        );
    }

    #[test]
    fn images_and_empty_documents_never_move() {
        let mut host = MockFullscreenHost::new();
        let mut nav = NavigationController::new("Hide person");
        nav.load_document("image/png", 0);
        assert_eq!(nav.apply(NavAction::Advance, &mut host), Transition::NoOp);
        assert_eq!(nav.apply(NavAction::Retreat, &mut host), Transition::NoOp);
        assert_eq!(nav.state(), NavigationState {
            file_type: FileType::Image,
            ..NavigationState::default()
        });
    }

    #[test]
    fn bounds_hold_for_arbitrary_action_sequences() {
        let mut host = MockFullscreenHost::new();
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for extent in 0..6u32 {
            for mime in [PDF_MIME, PPT_MIME] {
                let mut nav = NavigationController::new("Hide person");
                nav.load_document(mime, extent);
                for _ in 0..200 {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                    let action = if seed >> 63 == 0 {
                        NavAction::Advance
                    } else {
                        NavAction::Retreat
                    };
                    nav.apply(action, &mut host);

                    let s = nav.state();
                    assert!(s.pdf_page_num >= 1);
                    assert!(s.pdf_page_num <= s.total_pdf_pages.max(1));
                    assert!(s.ppt_slide_num < s.ppt_slide_count.max(1));
                }
            }
        }
    }

    #[test]
    fn subject_toggle_matches_label_and_canonical_names() {
        let nav = NavigationController::new("Rejtsd el");
        assert_eq!(
            nav.action_for_gesture("REJTSD EL"),
            Some(NavAction::ToggleSubject)
        );
        assert_eq!(
            nav.action_for_gesture("hide Person"),
            Some(NavAction::ToggleSubject)
        );
        assert_eq!(nav.action_for_gesture("Drawing"), None);
        assert_eq!(nav.action_for_gesture("no hand detected"), None);
    }

    #[test]
    fn toggling_subject_flips_visibility() {
        let mut host = MockFullscreenHost::new();
        let mut nav = NavigationController::new("Hide person");
        assert_eq!(
            nav.apply(NavAction::ToggleSubject, &mut host),
            Transition::SubjectVisibility(false)
        );
        assert!(!nav.subject().visible);
        nav.apply(NavAction::ToggleSubject, &mut host);
        assert!(nav.subject().visible);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut host = MockFullscreenHost::new();
        let mut nav = NavigationController::new("Hide person");
        for _ in 0..20 {
            nav.apply(NavAction::ZoomIn, &mut host);
        }
        assert_eq!(nav.subject().scale, 2.0);
        assert_eq!(nav.apply(NavAction::ZoomIn, &mut host), Transition::NoOp);
        for _ in 0..30 {
            nav.apply(NavAction::ZoomOut, &mut host);
        }
        assert_eq!(nav.subject().scale, 0.5);
    }

    #[test]
    fn fullscreen_state_follows_observation_not_request() {
        let mut host = MockFullscreenHost::rejecting();
        let mut nav = NavigationController::new("Hide person");
        assert_eq!(
            nav.apply(NavAction::ToggleFullscreen, &mut host),
            Transition::FullscreenRejected
        );
        assert!(!nav.is_fullscreen());

        let mut host = MockFullscreenHost::new();
        assert_eq!(
            nav.apply(NavAction::ToggleFullscreen, &mut host),
            Transition::FullscreenRequested
        );
        assert!(!nav.is_fullscreen());
        nav.on_fullscreen_change(host.is_fullscreen());
        assert!(nav.is_fullscreen());

        assert_eq!(
            nav.apply(NavAction::ToggleFullscreen, &mut host),
            Transition::FullscreenExitRequested
        );
    }

    #[test]
    fn arrow_keys_map_to_the_same_actions() {
        let right = KeyEvent::new(KeyCode::Right, KeyModifiers::NONE);
        let left = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        let other = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(
            NavigationController::action_for_key(&right),
            Some(NavAction::Advance)
        );
        assert_eq!(
            NavigationController::action_for_key(&left),
            Some(NavAction::Retreat)
        );
        assert_eq!(NavigationController::action_for_key(&other), None);

        let mut release = right;
        release.kind = KeyEventKind::Release;
        assert_eq!(NavigationController::action_for_key(&release), None);
    }

    #[test]
    fn mime_types_are_classified() {
        assert_eq!(FileType::from_mime("application/pdf"), FileType::Pdf);
        assert_eq!(FileType::from_mime(PPTX_MIME), FileType::Slideshow);
        assert_eq!(FileType::from_mime("image/jpeg"), FileType::Image);
        assert_eq!(FileType::from_mime("text/plain"), FileType::None);
    }

    #[test]
    fn loading_a_document_rewinds_navigation() {
        let mut host = MockFullscreenHost::new();
        let mut nav = pdf(1, 4);
        nav.apply(NavAction::Advance, &mut host);
        nav.load_document(PPT_MIME, 3);
        let s = nav.state();
        assert_eq!(s.file_type, FileType::Slideshow);
        assert_eq!(s.pdf_page_num, 1);
        assert_eq!(s.total_pdf_pages, 0);
        assert_eq!(s.ppt_slide_count, 3);
    }
}
