//! Composition root: session, services and the mounted route.

use std::sync::Arc;

use anyhow::Result;
use client_core::{
    CaptureDevice, ClientConfig, ConsentChange, FrameSink, FullscreenHost, GestureTransport,
    KeyValueStore, SessionApi, SessionIdentity, VideoSink,
};
use client_transport::{HttpApi, WsGestureTransport};
use tracing_appender::non_blocking::WorkerGuard;

use crate::builder::PageBuilder;
use crate::logging::setup_logging;
use crate::page::{PageMode, PresentationPage, TeardownReason};

/// Platform surfaces a host provides; each page gets fresh instances.
pub trait Platform: Send + Sync {
    fn capture_device(&self) -> Arc<dyn CaptureDevice>;
    fn video_sink(&self) -> Box<dyn VideoSink>;
    fn fullscreen_host(&self) -> Box<dyn FullscreenHost>;
}

/// Network collaborators shared by every page.
#[derive(Clone)]
pub struct Services {
    pub session_api: Arc<dyn SessionApi>,
    pub frame_sink: Arc<dyn FrameSink>,
    pub gesture_transport: Arc<dyn GestureTransport>,
}

impl Services {
    /// HTTP API and websocket channel at the configured endpoints.
    pub fn network(config: &ClientConfig) -> Self {
        let api = Arc::new(HttpApi::from_config(&config.endpoints));
        Self {
            session_api: api.clone(),
            frame_sink: api,
            gesture_transport: Arc::new(WsGestureTransport::from_config(&config.endpoints)),
        }
    }
}

/// Top-level views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Home,
    Presentation,
    /// Practice a single gesture by name.
    Practice { gesture: String },
    Settings,
}

impl Route {
    fn page_mode(&self) -> Option<PageMode> {
        match self {
            Route::Presentation => Some(PageMode::Presentation),
            Route::Practice { gesture } => Some(PageMode::Practice {
                expected: gesture.clone(),
            }),
            Route::Home | Route::Settings => None,
        }
    }
}

/// Owns the session and at most one mounted page.
pub struct PresenterApp {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<SessionIdentity>,
    services: Services,
    platform: Arc<dyn Platform>,
    route: Route,
    page: Option<PresentationPage>,
    /// Flushes the log file on drop.
    log_guard: Option<WorkerGuard>,
}

impl PresenterApp {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        services: Services,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let identity = Arc::new(SessionIdentity::activate(
            store.clone(),
            services.session_api.clone(),
        ));
        Self {
            config,
            store,
            identity,
            services,
            platform,
            route: Route::Home,
            page: None,
            log_guard: None,
        }
    }

    /// Load `.env` and build the client from process configuration.
    pub fn from_env(store: Arc<dyn KeyValueStore>, platform: Arc<dyn Platform>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_config(ClientConfig::from_env(), store, platform)
    }

    /// Install logging and connect to the configured endpoints.
    ///
    /// # Errors
    ///
    /// Fails if the log directory cannot be created or a global subscriber
    /// is already installed.
    pub fn from_config(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        let log_guard = setup_logging(config.log_dir.as_deref())?;
        tracing::info!(
            "Presenter client configured: api={} ws={}",
            config.endpoints.api_base,
            config.endpoints.ws_base
        );
        let services = Services::network(&config);
        let mut app = Self::new(config, store, services, platform);
        app.log_guard = log_guard;
        Ok(app)
    }

    /// Announce the session to the server. Failure is logged and ignored.
    pub async fn start(&self) -> bool {
        self.identity.register().await
    }

    /// Switch views, tearing down the current page before mounting the next.
    pub fn navigate(&mut self, route: Route) -> Result<()> {
        if let Some(mut page) = self.page.take() {
            page.teardown(TeardownReason::RouteChange);
        }

        if let Some(mode) = route.page_mode() {
            let page = PageBuilder::new()
                .config(self.config.clone())
                .identity(self.identity.clone())
                .store(self.store.clone())
                .frame_sink(self.services.frame_sink.clone())
                .gesture_transport(self.services.gesture_transport.clone())
                .capture_device(self.platform.capture_device())
                .video_sink(self.platform.video_sink())
                .fullscreen(self.platform.fullscreen_host())
                .mode(mode)
                .mount()?;
            self.page = Some(page);
        }

        tracing::info!("Route: {:?}", route);
        self.route = route;
        Ok(())
    }

    /// Answer the consent prompt; accepting starts the mounted page's camera.
    pub async fn answer_consent(&mut self, accepted: bool) -> ConsentChange {
        let change = self.identity.set_consent(accepted).await;
        if change == ConsentChange::Granted {
            if let Some(page) = self.page.as_mut() {
                if let Err(e) = page.start_camera().await {
                    tracing::warn!("Camera not started: {}", e);
                }
            }
        }
        change
    }

    /// Withdraw consent and tear down the mounted page immediately.
    pub async fn revoke_consent(&mut self) -> ConsentChange {
        let change = self.identity.revoke_consent().await;
        if let Some(page) = self.page.as_mut() {
            page.handle_consent();
        }
        change
    }

    /// Page-unload signal from the host.
    pub fn shutdown(&mut self) {
        if let Some(mut page) = self.page.take() {
            page.teardown(TeardownReason::PageUnload);
        }
        tracing::info!("Presenter client shut down");
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn page(&self) -> Option<&PresentationPage> {
        self.page.as_ref()
    }

    pub fn page_mut(&mut self) -> Option<&mut PresentationPage> {
        self.page.as_mut()
    }

    pub fn identity(&self) -> &Arc<SessionIdentity> {
        &self.identity
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_logging_to_file(&self) -> bool {
        self.log_guard.is_some()
    }
}

impl Drop for PresenterApp {
    fn drop(&mut self) {
        if let Some(mut page) = self.page.take() {
            page.teardown(TeardownReason::PageUnload);
        }
    }
}
