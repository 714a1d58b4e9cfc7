//! Gesture-driven presentation client.
//!
//! # Architecture
//!
//! ```text
//! PresenterApp (composition root, routes)
//!   └─→ PresentationPage (one per mounted route)
//!         ├─→ CameraResource ──→ SegmentationPipeline (engine callback)
//!         │                 └──→ FrameUplink (fixed period, fire-and-forget)
//!         ├─→ GestureChannel ──→ coordinate → MarkerLoop
//!         │                 └──→ named → RemapTable → NavigationController
//!         └─→ keyboard ────────────────────────────→ NavigationController
//! ```
//!
//! Consent from [`SessionIdentity`](client_core::SessionIdentity) gates the
//! camera and channel. Every exit path funnels into
//! [`PresentationPage::teardown`].

mod app;
mod builder;
pub mod channel;
pub mod cursor;
pub mod logging;
pub mod page;

pub use app::{Platform, PresenterApp, Route, Services};
pub use builder::PageBuilder;
pub use channel::GestureChannel;
pub use cursor::MarkerLoop;
pub use page::{Dispatched, PageError, PageMode, PresentationPage, TeardownReason};
