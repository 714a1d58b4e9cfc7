//! Device- and network-independent core of the presenter client.
//!
//! Houses session identity, gesture classification, navigation and marker
//! state machines, plus the collaborator traits the media and transport
//! crates implement.
pub mod config;
pub mod gesture;
pub mod marker;
pub mod navigation;
pub mod practice;
pub mod session;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use config::{
    CaptureConfig, ChannelConfig, ClientConfig, DisplayConfig, EndpointConfig, UplinkConfig,
};
pub use gesture::{GestureEvent, GestureParseError, IDLE_GESTURES, RemapTable, parse_message};
pub use marker::{CanvasGeometry, MarkerPosition, MarkerProjector, MarkerTarget};
pub use navigation::{
    FileType, NavAction, NavigationController, NavigationState, SubjectStyle, Transition,
};
pub use practice::PracticeFeedback;
pub use session::{ClientId, Consent, ConsentChange, Session, SessionIdentity};
pub use store::MemoryStore;
pub use traits::{
    CaptureDevice, ClientRegistration, DisplayError, EncodedFrame, FrameSink, FullscreenHost,
    GestureConnection, GestureTransport, KeyValueStore, Matte, MediaError, MediaStream,
    SessionApi, StoreError, TransportError, VideoFrame, VideoSink,
};
