//! HTTP API client.

use async_trait::async_trait;
use client_core::{
    ClientRegistration, EncodedFrame, EndpointConfig, FrameSink, SessionApi, TransportError,
};
use reqwest::multipart::{Form, Part};

/// Client for the recognizer's HTTP endpoints.
///
/// Implements both [`SessionApi`] (registration and consent notifications)
/// and [`FrameSink`] (frame uploads) against one base URL.
#[derive(Clone)]
pub struct HttpApi {
    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client (shares its connection pool across clones)
    http_client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Use a preconfigured client (timeouts, proxy settings).
    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn from_config(endpoints: &EndpointConfig) -> Self {
        Self::new(endpoints.api_base.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_registration(
        &self,
        path: &str,
        registration: &ClientRegistration,
    ) -> Result<(), TransportError> {
        tracing::debug!(
            "POST /{} clientId={} consentAccepted={:?}",
            path,
            registration.client_id,
            registration.consent_accepted
        );

        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(registration)
            .send()
            .await
            .map_err(network)?;

        check_status(response).await
    }
}

#[async_trait]
impl SessionApi for HttpApi {
    async fn register_client(
        &self,
        registration: &ClientRegistration,
    ) -> Result<(), TransportError> {
        self.post_registration("register_client", registration).await
    }

    async fn client_consent(&self, registration: &ClientRegistration) -> Result<(), TransportError> {
        self.post_registration("client_consent", registration).await
    }
}

#[async_trait]
impl FrameSink for HttpApi {
    async fn upload_frame(&self, frame: EncodedFrame) -> Result<(), TransportError> {
        let EncodedFrame {
            sequence,
            client_id,
            jpeg,
        } = frame;

        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let form = Form::new().part("frame", part);

        let response = self
            .http_client
            .post(self.endpoint("process_frame"))
            .query(&[
                ("frameId", sequence.to_string()),
                ("clientId", client_id.to_string()),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(network)?;

        check_status(response).await
    }
}

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
