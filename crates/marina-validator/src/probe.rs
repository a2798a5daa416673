//! HTTP reachability probe
//!
//! The classifier resolves probe results through the `UrlProbe` trait so
//! tests can substitute canned responses. `HttpProbe` is the production
//! implementation: HEAD first, GET fallback when the server rejects HEAD.

use async_trait::async_trait;

use marina_core::{AppError, Config};

/// What a probe learned about a URL. Status is the final status after
/// redirects; content type is the bare mime, parameters stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait UrlProbe: Send + Sync {
    /// `Err` means the request itself failed (DNS, connect, timeout); an HTTP
    /// error status is a successful probe and comes back in the response.
    async fn probe(&self, url: &str) -> Result<ProbeResponse, AppError>;
}

pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.probe_max_redirects))
            .user_agent(format!(
                "marina-media-validator/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| AppError::Probe(format!("Failed to build probe client: {e}")))?;
        Ok(Self { client })
    }

    fn response_of(response: reqwest::Response) -> ProbeResponse {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        ProbeResponse {
            status: response.status().as_u16(),
            content_type,
        }
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, AppError> {
        match self.client.head(url).send().await {
            Ok(response) if response.status() != reqwest::StatusCode::METHOD_NOT_ALLOWED => {
                return Ok(Self::response_of(response));
            }
            Ok(_) => {
                tracing::debug!(url, "HEAD rejected with 405, retrying with GET");
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "HEAD probe failed, retrying with GET");
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Probe(format!("Probe request failed: {e}")))?;
        Ok(Self::response_of(response))
    }
}
