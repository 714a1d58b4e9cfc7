//! Network implementations of the client's collaborator traits.
//!
//! - [`HttpApi`]: `POST /register_client`, `/client_consent`, `/process_frame`
//! - [`WsGestureTransport`]: the persistent `/ws?clientId=` gesture channel
pub mod http;
pub mod ws;

pub use http::HttpApi;
pub use ws::{WsConnection, WsGestureTransport};
