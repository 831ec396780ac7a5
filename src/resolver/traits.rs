// Seams between the resolver and the outside world

use async_trait::async_trait;
use std::time::Duration;

use super::errors::ResolveError;
use super::models::{ExtractedStream, Liveness, Provider, RawMetadata, StreamKind, VideoId};

/// Fetches and normalizes per-video metadata from one provider
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(
        &self,
        provider: &Provider,
        video_id: &VideoId,
        timeout: Duration,
    ) -> Result<RawMetadata, ResolveError>;
}

/// Cheap liveness check for a provider
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, provider: &Provider, timeout: Duration) -> Liveness;
}

/// Last-resort resolver used when every provider failed
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        video_url: &str,
        kind: StreamKind,
    ) -> Result<ExtractedStream, ResolveError>;
}

/// Where the provider list comes from (static config, remote instance list...)
#[async_trait]
pub trait ProviderSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load(&self) -> Result<Vec<Provider>, ResolveError>;
}
