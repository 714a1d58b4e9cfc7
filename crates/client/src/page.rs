//! Presentation page lifecycle.
//!
//! A mounted page exclusively owns its camera, compositor, uplink, gesture
//! channel and marker loop. Every exit path (explicit unsubscribe, consent
//! revocation, route change, unmount, page unload) goes through
//! [`PresentationPage::teardown`], which releases each resource through its
//! own idempotent stop operation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use client_core::{
    CanvasGeometry, Consent, FileType, FullscreenHost, GestureEvent, KeyValueStore, MarkerPosition,
    MarkerTarget, Matte, MediaError, NavAction, NavigationController, NavigationState,
    PracticeFeedback, RemapTable, Session, SessionIdentity, StoreError, SubjectStyle, Transition,
    VideoFrame,
};
use client_media::{CameraResource, FrameUplink, SegmentationPipeline};
use crossterm::event::KeyEvent;
use image::RgbaImage;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::channel::GestureChannel;
use crate::cursor::MarkerLoop;

/// What a mounted page does with named gestures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageMode {
    /// Named gestures navigate the displayed document.
    Presentation,
    /// Named gestures are compared against `expected`.
    Practice { expected: String },
}

/// Why a page is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownReason {
    Unsubscribe,
    ConsentRevoked,
    RouteChange,
    Unmount,
    PageUnload,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TeardownReason::Unsubscribe => "unsubscribe",
            TeardownReason::ConsentRevoked => "consent revoked",
            TeardownReason::RouteChange => "route change",
            TeardownReason::Unmount => "unmount",
            TeardownReason::PageUnload => "page unload",
        };
        f.write_str(reason)
    }
}

/// Refusals surfaced to the user as a local notice.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Camera and gesture channel require consent")]
    ConsentRequired,

    #[error("Camera unavailable: {0}")]
    Camera(#[from] MediaError),
}

/// Outcome of handling one inbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    Marker(MarkerTarget),
    Navigation(Transition),
    Practice(PracticeFeedback),
    /// Idle, unmapped or unrecognized gesture.
    Ignored,
    /// Consent was withdrawn and the page tore itself down.
    ConsentRevoked,
}

/// Everything a page needs at mount time. Assembled by [`crate::PageBuilder`].
pub(crate) struct PageParts {
    pub identity: Arc<SessionIdentity>,
    pub store: Arc<dyn KeyValueStore>,
    pub camera: CameraResource,
    pub uplink: FrameUplink,
    pub channel: GestureChannel,
    pub events_rx: mpsc::Receiver<GestureEvent>,
    pub fullscreen: Box<dyn FullscreenHost>,
    pub marker_interval: Duration,
    pub subject_label: String,
    pub mode: PageMode,
}

pub struct PresentationPage {
    identity: Arc<SessionIdentity>,
    session_rx: watch::Receiver<Session>,
    store: Arc<dyn KeyValueStore>,

    camera: CameraResource,
    pipeline: SegmentationPipeline,
    subject_tx: watch::Sender<SubjectStyle>,
    uplink: FrameUplink,
    channel: GestureChannel,
    events_rx: mpsc::Receiver<GestureEvent>,

    marker: MarkerLoop,
    marker_interval: Duration,
    geometry: CanvasGeometry,

    navigation: NavigationController,
    fullscreen: Box<dyn FullscreenHost>,
    remap: RemapTable,

    mode: PageMode,
    subscribed: bool,
    last_gesture: Option<String>,
    feedback: PracticeFeedback,
}

impl PresentationPage {
    pub(crate) fn mount(parts: PageParts) -> Self {
        let PageParts {
            identity,
            store,
            camera,
            uplink,
            channel,
            events_rx,
            fullscreen,
            marker_interval,
            subject_label,
            mode,
        } = parts;

        let navigation = NavigationController::new(subject_label);
        let (subject_tx, subject_rx) = watch::channel(navigation.subject());
        let remap = RemapTable::load(store.as_ref());
        let session_rx = identity.subscribe();

        info!(?mode, remapped = remap.len(), "Page mounted");

        Self {
            identity,
            session_rx,
            store,
            camera,
            pipeline: SegmentationPipeline::new(subject_rx),
            subject_tx,
            uplink,
            channel,
            events_rx,
            marker: MarkerLoop::spawn(marker_interval),
            marker_interval,
            geometry: CanvasGeometry::default(),
            navigation,
            fullscreen,
            remap,
            mode,
            subscribed: false,
            last_gesture: None,
            feedback: PracticeFeedback::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Acquire the camera for preview and compositing.
    pub async fn start_camera(&mut self) -> Result<(), PageError> {
        let consent = self.identity.consent();
        if !consent.is_accepted() {
            return Err(PageError::ConsentRequired);
        }
        self.camera.acquire(consent).await?;

        // Consent may have been withdrawn while the device was opening.
        if !self.identity.consent().is_accepted() {
            self.teardown(TeardownReason::ConsentRevoked);
            return Err(PageError::ConsentRequired);
        }
        Ok(())
    }

    /// Start uploading frames and listening for gestures.
    ///
    /// A channel that fails to connect is logged and leaves the page
    /// subscribed with uploads running; there is no automatic reconnect.
    pub async fn subscribe(&mut self) -> Result<(), PageError> {
        if self.subscribed {
            return Ok(());
        }
        if !self.identity.consent().is_accepted() {
            return Err(PageError::ConsentRequired);
        }
        if !self.camera.is_held() {
            self.start_camera().await?;
        }
        if !self.marker.is_running() {
            self.marker = MarkerLoop::resume(
                self.marker_interval,
                self.marker.position(),
                self.marker.target(),
            );
        }
        // A reader closed by the previous teardown may have raced one last event in.
        while self.events_rx.try_recv().is_ok() {}

        let client_id = self.identity.client_id();
        if let Some(tap) = self.camera.frame_tap() {
            self.uplink.start(tap, client_id.clone());
        }
        if let Err(e) = self.channel.open(&client_id).await {
            warn!("Gesture channel unavailable: {}", e);
        }
        self.subscribed = true;

        if !self.identity.consent().is_accepted() {
            self.teardown(TeardownReason::ConsentRevoked);
            return Err(PageError::ConsentRequired);
        }
        info!(client_id = %client_id, "Subscribed");
        Ok(())
    }

    pub fn unsubscribe(&mut self) -> bool {
        self.teardown(TeardownReason::Unsubscribe)
    }

    /// Release every resource. Safe to call any number of times.
    ///
    /// Returns `true` if anything was still live.
    pub fn teardown(&mut self, reason: TeardownReason) -> bool {
        let camera = self.camera.release();
        let uplink = self.uplink.stop();
        let channel = self.channel.close();
        let marker = self.marker.cancel();
        let was_subscribed = std::mem::replace(&mut self.subscribed, false);

        // Events from the closed connection must not reach the next subscription.
        while self.events_rx.try_recv().is_ok() {}

        let released = camera || uplink || channel || marker || was_subscribed;
        if released {
            info!(
                %reason,
                camera, uplink, channel, marker, "Page torn down"
            );
        } else {
            debug!(%reason, "Teardown: nothing to release");
        }
        released
    }

    /// React to a committed consent change. Returns `true` if the page tore down.
    pub fn handle_consent(&mut self) -> bool {
        let consent = self.session_rx.borrow_and_update().consent;
        if consent == Consent::Accepted {
            return false;
        }
        let live = self.subscribed || self.camera.is_held() || self.channel.is_open();
        live && self.teardown(TeardownReason::ConsentRevoked)
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Wait for the next gesture or consent change and handle it.
    pub async fn dispatch_next(&mut self) -> Dispatched {
        if self.handle_consent() {
            return Dispatched::ConsentRevoked;
        }
        tokio::select! {
            changed = self.session_rx.changed() => {
                if changed.is_ok() && self.handle_consent() {
                    Dispatched::ConsentRevoked
                } else {
                    Dispatched::Ignored
                }
            }
            Some(event) = self.events_rx.recv() => {
                if self.subscribed {
                    self.dispatch(event)
                } else {
                    debug!("Discarding gesture received after teardown");
                    Dispatched::Ignored
                }
            }
            else => Dispatched::Ignored,
        }
    }

    /// Handle everything already queued without waiting. Events queued
    /// while unsubscribed are discarded.
    pub fn dispatch_pending(&mut self) -> Vec<Dispatched> {
        if self.handle_consent() {
            return vec![Dispatched::ConsentRevoked];
        }
        let mut handled = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if self.subscribed {
                handled.push(self.dispatch(event));
            }
        }
        handled
    }

    /// Route one event to the marker or to navigation.
    pub fn dispatch(&mut self, event: GestureEvent) -> Dispatched {
        match event {
            GestureEvent::Coordinate { x, y } => {
                let target = self.geometry.project(x, y);
                self.marker.set_target(target);
                Dispatched::Marker(target)
            }
            GestureEvent::Named(name) => {
                let dispatched = self.dispatch_named(&name);
                self.last_gesture = Some(name);
                dispatched
            }
        }
    }

    fn dispatch_named(&mut self, name: &str) -> Dispatched {
        if let PageMode::Practice { expected } = &self.mode {
            self.feedback = PracticeFeedback::evaluate(name, expected);
            return Dispatched::Practice(self.feedback);
        }
        if client_core::gesture::is_idle_name(name) {
            return Dispatched::Ignored;
        }

        let action_name = self.remap.resolve(name);
        match self.navigation.action_for_gesture(action_name) {
            Some(action) => Dispatched::Navigation(self.apply(action)),
            None => {
                debug!(gesture = name, action = action_name, "No action for gesture");
                Dispatched::Ignored
            }
        }
    }

    /// Keyboard input, through the same transition logic as gestures.
    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<Transition> {
        NavigationController::action_for_key(key).map(|action| self.apply(action))
    }

    fn apply(&mut self, action: NavAction) -> Transition {
        let transition = self.navigation.apply(action, self.fullscreen.as_mut());
        if matches!(
            transition,
            Transition::SubjectVisibility(_) | Transition::SubjectScale(_)
        ) {
            self.subject_tx.send_replace(self.navigation.subject());
        }
        debug!(?action, ?transition, "Navigation applied");
        transition
    }

    // ------------------------------------------------------------------------
    // Host notifications
    // ------------------------------------------------------------------------

    /// One `(frame, matte)` pair from the segmentation engine.
    pub fn render_segmentation(&mut self, frame: &VideoFrame, matte: &Matte) -> bool {
        self.pipeline.render(frame, matte)
    }

    pub fn set_background(&mut self, background: Option<RgbaImage>) {
        self.pipeline.set_background(background);
    }

    pub fn on_fullscreen_change(&mut self, fullscreen: bool) {
        self.navigation.on_fullscreen_change(fullscreen);
    }

    pub fn load_document(&mut self, mime: &str, extent: u32) -> FileType {
        self.navigation.load_document(mime, extent)
    }

    pub fn set_canvas_geometry(&mut self, geometry: CanvasGeometry) {
        self.geometry = geometry;
    }

    /// Replace and persist the gesture remap table.
    pub fn set_remap(&mut self, remap: RemapTable) -> Result<(), StoreError> {
        remap.save(self.store.as_ref())?;
        self.remap = remap;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_camera_ready(&self) -> bool {
        self.camera.is_ready()
    }

    pub fn camera_error(&self) -> Option<&MediaError> {
        self.camera.last_error()
    }

    pub fn is_channel_open(&self) -> bool {
        self.channel.is_open()
    }

    pub fn is_uplink_running(&self) -> bool {
        self.uplink.is_running()
    }

    pub fn is_marker_running(&self) -> bool {
        self.marker.is_running()
    }

    pub fn navigation_state(&self) -> NavigationState {
        self.navigation.state()
    }

    pub fn subject(&self) -> SubjectStyle {
        self.navigation.subject()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.navigation.is_fullscreen()
    }

    pub fn marker_target(&self) -> Option<MarkerTarget> {
        self.marker.target()
    }

    pub fn marker_position(&self) -> MarkerPosition {
        self.marker.position()
    }

    /// Most recent named gesture, idle names included.
    pub fn last_gesture(&self) -> Option<&str> {
        self.last_gesture.as_deref()
    }

    pub fn practice_feedback(&self) -> PracticeFeedback {
        self.feedback
    }

    pub fn mode(&self) -> &PageMode {
        &self.mode
    }

    /// Composited output and first-frame readiness.
    pub fn pipeline(&self) -> &SegmentationPipeline {
        &self.pipeline
    }

    pub fn last_sequence(&self) -> u64 {
        self.uplink.last_sequence()
    }
}

impl Drop for PresentationPage {
    fn drop(&mut self) {
        self.teardown(TeardownReason::Unmount);
    }
}
