//! HTTP transport seam.
//!
//! Every network call the service makes (source download, pre-signed PUT,
//! completion callback) goes through [`HttpTransport`]. Production uses
//! [`ReqwestTransport`]; tests substitute an in-memory fake so that whole jobs
//! can run without a network.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded lossily, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// No HTTP response was obtained (connect error, timeout, TLS failure).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        }
    }
}

/// The three HTTP exchanges a job performs.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `GET url`, returning the full body.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;

    /// `PUT url` with `body` and the given `Content-Type`.
    async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    /// `POST url` with a JSON body and extra headers.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

async fn collect(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    Ok(HttpResponse::new(status, body.to_vec()))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        collect(response).await
    }

    async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .timeout(timeout)
            .send()
            .await?;
        collect(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).json(body).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        collect(request.send().await?).await
    }
}
