use crate::endpoint::Endpoint;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod fastcgi;
pub mod http;

pub use fastcgi::FastCgiFetcher;
pub use http::HttpFetcher;

/// Retrieves the raw status report from the pool manager. No retries.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<u8>>;
}

/// Dispatches to the transport matching the endpoint.
pub struct DataFetcher {
    http: HttpFetcher,
    fastcgi: FastCgiFetcher,
}

impl DataFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(timeout)?,
            fastcgi: FastCgiFetcher::new(timeout),
        })
    }
}

#[async_trait]
impl StatusFetcher for DataFetcher {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<u8>> {
        match endpoint {
            Endpoint::Http(url) => self.http.get(url).await,
            Endpoint::FastCgi(target) => self.fastcgi.get(target).await,
        }
    }
}
