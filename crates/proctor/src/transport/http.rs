//! Thin reqwest wrapper that reports failures as [`TransportError`].

use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::TransportError;

pub struct HttpClient {
    client: reqwest::Client,
    bearer: Option<String>,
}

impl HttpClient {
    /// Build a client. `timeout` is a backstop; per-attempt limits come from
    /// [`ResilientTransport`](super::ResilientTransport).
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("proctor/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            bearer: None,
        })
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// POST `body` as JSON and decode the JSON response.
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;
        debug!(
            "POST {url}: HTTP {status} in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            text.len()
        );

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        trace!("POST {url} response: {text}");
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
