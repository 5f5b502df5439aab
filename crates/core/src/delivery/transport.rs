use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};

use crate::error::{Result, TelemetryError};

/// Tenant-scoped collector location: `{base}/{tenant}/events/`.
#[derive(Debug, Clone)]
pub struct CollectorEndpoint {
    base: Url,
}

impl CollectorEndpoint {
    pub fn parse(base: &str) -> Result<Self> {
        let url = Url::parse(base).map_err(|e| TelemetryError::InvalidEndpoint {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(TelemetryError::InvalidEndpoint {
                url: base.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        Ok(Self { base: url })
    }

    pub fn events_url(&self, tenant: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TelemetryError::InvalidEndpoint {
                url: self.base.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(tenant)
            .push("events")
            .push("");
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct CollectorRequest {
    pub url: Url,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CollectorResponse {
    pub status: u16,
    pub body: String,
}

impl CollectorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One POST to the collector. Implementations report HTTP statuses as
/// responses and reserve `Err` for requests that never got an answer.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn post(&self, request: &CollectorRequest) -> Result<CollectorResponse>;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &CollectorRequest) -> Result<CollectorResponse> {
        let response = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(CollectorResponse { status, body })
    }
}
