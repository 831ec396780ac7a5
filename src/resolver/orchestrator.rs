// Resolver - turns (video id, kind) into one playable stream URL
//
// State machine:
//   TryProviders -> Done
//   TryProviders -> TryFallback -> Done | Failed
//
// Providers are tried one at a time in registry order; every outcome is fed
// back into the registry. The fallback extractor runs at most once, and only
// after every provider in every pass has failed. The whole machine runs under
// one overall deadline; the provider phase gets what is left of it once the
// fallback timeout is set aside, so hanging providers cannot starve the
// fallback.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::config::ResolverConfig;
use super::errors::{ResolveError, ResolverFailure};
use super::models::{Provider, ResolvedStream, StreamKind, StreamSource, VideoId};
use super::registry::{CandidateOrder, ProviderRegistry};
use super::selector::{SelectionPolicy, StreamSelector};
use super::traits::{FallbackExtractor, StreamFetcher};
use super::utils::display_title;

/// Per-call behaviour of the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub order: CandidateOrder,
    /// Full passes over the provider list before falling back
    pub max_passes: u32,
    pub pass_delay: Duration,
    pub fetch_timeout: Duration,
    pub overall_timeout: Duration,
    /// Slot kept free for the fallback inside `overall_timeout`
    pub fallback_timeout: Duration,
    pub policy: SelectionPolicy,
    pub watch_base_url: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for ResolverSettings {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            order: config.provider_order,
            max_passes: config.max_passes.max(1),
            pass_delay: config.pass_delay(),
            fetch_timeout: config.fetch_timeout(),
            overall_timeout: config.overall_timeout(),
            fallback_timeout: config.fallback_timeout(),
            policy: SelectionPolicy {
                prefer_compatible_audio: config.prefer_compatible_audio,
            },
            watch_base_url: config.watch_base_url.clone(),
        }
    }
}

enum ResolveState {
    TryProviders,
    TryFallback,
    Done(ResolvedStream),
    Failed(ResolveError),
}

pub struct Resolver {
    registry: Arc<ProviderRegistry>,
    fetcher: Arc<dyn StreamFetcher>,
    extractor: Arc<dyn FallbackExtractor>,
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        fetcher: Arc<dyn StreamFetcher>,
        extractor: Arc<dyn FallbackExtractor>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            registry,
            fetcher,
            extractor,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Resolve `video_id` to a single stream of `kind`
    pub async fn resolve(
        &self,
        video_id: &str,
        kind: StreamKind,
    ) -> Result<ResolvedStream, ResolverFailure> {
        let id = VideoId::parse(video_id)?;
        let deadline = self.settings.overall_timeout;

        let outcome = match tokio::time::timeout(deadline, self.run(&id, kind)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResolveError::DeadlineExceeded(deadline)),
        };

        outcome.map_err(|e| {
            let failure = ResolverFailure::from(e);
            error!(video_id = %id, %kind, retry = failure.retry_suggested, "resolve failed: {}", failure);
            failure
        })
    }

    fn provider_budget(&self) -> Duration {
        self.settings
            .overall_timeout
            .saturating_sub(self.settings.fallback_timeout)
    }

    async fn run(&self, id: &VideoId, kind: StreamKind) -> Result<ResolvedStream, ResolveError> {
        let mut state = ResolveState::TryProviders;
        let budget = self.provider_budget();

        loop {
            state = match state {
                ResolveState::TryProviders => {
                    match tokio::time::timeout(budget, self.try_providers(id, kind)).await {
                        Ok(Some(stream)) => ResolveState::Done(stream),
                        Ok(None) => ResolveState::TryFallback,
                        Err(_) => {
                            warn!(video_id = %id, ?budget, "provider budget used up");
                            ResolveState::TryFallback
                        }
                    }
                }
                ResolveState::TryFallback => match self.try_fallback(id, kind).await {
                    Ok(stream) => ResolveState::Done(stream),
                    Err(e) => ResolveState::Failed(e),
                },
                ResolveState::Done(stream) => return Ok(stream),
                ResolveState::Failed(e) => return Err(e),
            };
        }
    }

    async fn try_providers(&self, id: &VideoId, kind: StreamKind) -> Option<ResolvedStream> {
        for pass in 0..self.settings.max_passes {
            if pass > 0 {
                debug!(pass, "retrying provider list");
                tokio::time::sleep(self.settings.pass_delay).await;
            }

            let candidates = self.registry.candidates(self.settings.order);
            for provider in &candidates {
                debug!(provider = %provider.base_url, video_id = %id, "trying provider");

                match self.try_provider(provider, id, kind).await {
                    Ok(stream) => {
                        self.registry.mark_result(provider, true);
                        info!(source = %stream.source, video_id = %id, %kind, "resolved");
                        return Some(stream);
                    }
                    Err(e) => {
                        self.registry.mark_result(provider, false);
                        warn!(provider = %provider.base_url, video_id = %id, "provider failed: {}", e);
                    }
                }
            }
        }

        None
    }

    async fn try_provider(
        &self,
        provider: &Provider,
        id: &VideoId,
        kind: StreamKind,
    ) -> Result<ResolvedStream, ResolveError> {
        let metadata = self
            .fetcher
            .fetch(provider, id, self.settings.fetch_timeout)
            .await?;
        let chosen = StreamSelector::select(&metadata.candidates, kind, self.settings.policy)?;

        Ok(ResolvedStream {
            url: chosen.url,
            display_title: display_title(metadata.uploader.as_deref(), metadata.title.as_deref()),
            kind,
            source: StreamSource::Provider(provider.base_url.clone()),
            mime_type: chosen.mime_type,
            ext: None,
        })
    }

    async fn try_fallback(
        &self,
        id: &VideoId,
        kind: StreamKind,
    ) -> Result<ResolvedStream, ResolveError> {
        let watch_url = format!(
            "{}/watch?v={}",
            self.settings.watch_base_url.trim_end_matches('/'),
            id.url_encoded()
        );
        info!(extractor = self.extractor.name(), video_id = %id, "all providers failed, falling back");

        let extracted = self.extractor.extract(&watch_url, kind).await?;

        Ok(ResolvedStream {
            url: extracted.direct_url,
            display_title: display_title(Some(&extracted.uploader), Some(&extracted.title)),
            kind,
            source: StreamSource::Fallback(self.extractor.name()),
            mime_type: None,
            ext: extracted.ext,
        })
    }
}
