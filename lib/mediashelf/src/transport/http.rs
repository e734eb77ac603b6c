use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ApiRequest, Transport};
use crate::error::{Result, ShelfError};

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

#[derive(Default)]
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    /// Per-request timeout. The data layer itself never times out; an expired
    /// request simply surfaces as a transport failure.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let base_url_str = self
            .base_url
            .ok_or_else(|| ShelfError::NotConfigured("missing API base url".to_string()))?;
        // Trailing slash so relative joins keep any path prefix.
        let base_url = Url::parse(&format!("{}/", base_url_str.trim_end_matches('/')))?;

        let mut client = Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(HttpTransport {
            base_url,
            client: client.build()?,
        })
    }
}

impl HttpTransport {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn handle_response(response: Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<Value>(&text);

        if status.is_success() {
            return parsed.map_err(|e| ShelfError::Decode(format!("JSON parse error: {e}")));
        }
        match parsed {
            // Error envelopes come back with a matching HTTP status; let the
            // envelope code and message through.
            Ok(body) if body.get("code").is_some() => Ok(body),
            _ => {
                let detail = match text.trim() {
                    "" => status.canonical_reason().unwrap_or("no body"),
                    trimmed => trimmed,
                };
                Err(ShelfError::Transport(format!(
                    "HTTP {}: {detail}",
                    status.as_u16()
                )))
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let url = self.base_url.join(request.path.trim_start_matches('/'))?;
        debug!("Request: {} {}", request.method, url);

        let mut builder = self.client.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        Self::handle_response(response).await
    }
}
