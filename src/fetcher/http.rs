use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("php-fpm-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &Url) -> Result<Vec<u8>> {
        log::debug!("Fetching status from {}", url);

        let res = self.client.get(url.clone()).send().await?;
        let status = res.status();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus(status.as_u16()));
        }

        let body = res.bytes().await?;
        log::debug!("Status report length: {} bytes", body.len());
        Ok(body.to_vec())
    }
}
