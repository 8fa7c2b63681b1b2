//! Transport abstraction for opening a query stream

use async_trait::async_trait;
use parking_lot::RwLock;
use themis_wire::{BackendClient, ByteStream, Result};

/// Opens the raw response stream for one user query
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `input` and return the response body, chunked arbitrarily
    async fn open(&self, input: &str) -> Result<ByteStream>;
}

/// Transport that talks to the backend over HTTP.
///
/// The base URL can be swapped between requests; a request already running
/// keeps the URL it started with.
pub struct HttpTransport {
    client: RwLock<BackendClient>,
}

impl HttpTransport {
    /// Create a transport for the given backend base URL
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_client(BackendClient::new(base_url))
    }

    /// Create from an existing client
    pub fn with_client(client: BackendClient) -> Self {
        Self {
            client: RwLock::new(client),
        }
    }

    pub fn base_url(&self) -> String {
        self.client.read().base_url().to_string()
    }

    /// Point subsequent requests at a different backend
    pub fn set_base_url(&self, base_url: impl AsRef<str>) {
        let mut client = self.client.write();
        *client = client.rebase(base_url);
        tracing::debug!("Backend URL set to {}", client.base_url());
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, input: &str) -> Result<ByteStream> {
        let client = self.client.read().clone();
        client.query(input).await
    }
}
