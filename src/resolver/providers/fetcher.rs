// HTTP StreamFetcher - one GET per provider, normalized on the way out

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::normalize::parse_metadata;
use crate::resolver::errors::ResolveError;
use crate::resolver::models::{Provider, RawMetadata, VideoId};
use crate::resolver::traits::StreamFetcher;

pub struct HttpStreamFetcher {
    client: reqwest::Client,
}

impl HttpStreamFetcher {
    /// The client carries the User-Agent and proxy (see `utils::build_http_client`)
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn fetch(
        &self,
        provider: &Provider,
        video_id: &VideoId,
        timeout: Duration,
    ) -> Result<RawMetadata, ResolveError> {
        let url = provider.streams_url(video_id);
        debug!(%url, "fetching stream metadata");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(ResolveError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::ProviderUnreachable(format!(
                "{} returned HTTP {}",
                provider.base_url, status
            )));
        }

        let body = response.bytes().await.map_err(ResolveError::from_reqwest)?;
        parse_metadata(&body)
    }
}
