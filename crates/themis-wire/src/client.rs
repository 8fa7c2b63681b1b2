//! HTTP client for the research backend

use std::pin::Pin;

use futures::StreamExt;
use serde::Serialize;
use tokio_stream::Stream;

use crate::error::{Error, Result};

/// Address used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Raw response body, chunked however the network delivers it
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Client for `POST {base_url}/query`
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    input: &'a str,
}

impl BackendClient {
    /// Create a client for the given base URL. Trailing slashes are stripped.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest::Client`
    pub fn with_client(client: reqwest::Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        }
    }

    /// Same connection pool, different backend
    pub fn rebase(&self, base_url: impl AsRef<str>) -> Self {
        Self::with_client(self.client.clone(), base_url)
    }

    /// The base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the query endpoint
    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    /// Send a query and return the response body as a byte stream.
    ///
    /// Fails if the request cannot be sent, the backend answers with a
    /// non-success status, or the response declares a content type other
    /// than `text/event-stream`.
    pub async fn query(&self, input: &str) -> Result<ByteStream> {
        let url = self.query_url();
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { input })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), text));
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !is_event_stream(content_type) {
                return Err(Error::UnexpectedResponse(format!(
                    "expected text/event-stream, got {}",
                    content_type
                )));
            }
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from)),
        ))
    }
}

/// Check that `url` can be used as a backend base URL and return it with
/// surrounding whitespace and trailing slashes stripped.
pub fn validate_base_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        Error::InvalidConfig(format!("backend URL '{}' is not a valid URL: {}", url, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidConfig(format!(
            "backend URL '{}' must use http:// or https://",
            url
        )));
    }
    Ok(url.to_string())
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
}
