// ProviderRegistry - candidate order plus advisory liveness/ranking state
//
// Shared across concurrent resolve calls behind one RwLock. Stale ranking
// is fine; providers are never dropped, only sorted later.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::models::{Liveness, Provider};
use super::traits::HealthProbe;

/// How `candidates()` orders providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrder {
    /// Random order per call to spread load
    #[default]
    Shuffled,
    /// Shuffled, then fewest recent failures and best liveness first
    HealthRanked,
    /// Configured order
    Fixed,
}

#[derive(Debug, Clone)]
struct ProviderEntry {
    provider: Provider,
    successes: u64,
    failures: u64,
    failure_streak: u32,
    last_failure: Option<Instant>,
}

/// Point-in-time view of one provider
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub successes: u64,
    pub failures: u64,
    pub failure_streak: u32,
}

pub struct ProviderRegistry {
    entries: RwLock<Vec<ProviderEntry>>,
    failure_decay: Duration,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self::with_failure_decay(providers, Duration::from_secs(300))
    }

    /// Failure streaks older than `failure_decay` stop counting against a provider
    pub fn with_failure_decay(providers: Vec<Provider>, failure_decay: Duration) -> Self {
        let mut entries: Vec<ProviderEntry> = Vec::with_capacity(providers.len());
        for provider in providers {
            if entries
                .iter()
                .any(|e| e.provider.base_url == provider.base_url)
            {
                continue;
            }
            entries.push(ProviderEntry {
                provider,
                successes: 0,
                failures: 0,
                failure_streak: 0,
                last_failure: None,
            });
        }

        Self {
            entries: RwLock::new(entries),
            failure_decay,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Providers in the order they should be tried
    pub fn candidates(&self, order: CandidateOrder) -> Vec<Provider> {
        let now = Instant::now();
        let entries = self.entries.read();

        let mut ranked: Vec<(u32, u8, Provider)> = entries
            .iter()
            .map(|e| {
                (
                    self.recent_failures(e, now),
                    e.provider.liveness.rank(),
                    e.provider.clone(),
                )
            })
            .collect();
        drop(entries);

        match order {
            CandidateOrder::Fixed => {}
            CandidateOrder::Shuffled => ranked.shuffle(&mut rand::rng()),
            CandidateOrder::HealthRanked => {
                ranked.shuffle(&mut rand::rng());
                // Stable: equally ranked providers keep their shuffled order
                ranked.sort_by_key(|(failures, liveness, _)| (*failures, *liveness));
            }
        }

        ranked.into_iter().map(|(_, _, p)| p).collect()
    }

    fn recent_failures(&self, entry: &ProviderEntry, now: Instant) -> u32 {
        match entry.last_failure {
            Some(at) if now.duration_since(at) <= self.failure_decay => entry.failure_streak,
            _ => 0,
        }
    }

    /// Record the outcome of one request against `provider`
    pub fn mark_result(&self, provider: &Provider, succeeded: bool) {
        let mut entries = self.entries.write();
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.provider.base_url == provider.base_url)
        else {
            return;
        };

        if succeeded {
            entry.successes += 1;
            entry.failure_streak = 0;
            entry.provider.liveness = Liveness::Healthy;
        } else {
            entry.failures += 1;
            entry.failure_streak = entry.failure_streak.saturating_add(1);
            entry.last_failure = Some(Instant::now());
        }
    }

    /// Record a probe outcome
    pub fn set_liveness(&self, base_url: &str, liveness: Liveness) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.provider.base_url == base_url) {
            entry.provider.liveness = liveness;
            entry.provider.last_checked = Some(OffsetDateTime::now_utc());
        }
    }

    /// Probe every provider concurrently; returns how many came back healthy
    pub async fn probe_all(&self, probe: &dyn HealthProbe, timeout: Duration) -> usize {
        let providers = self.candidates(CandidateOrder::Fixed);

        let results = futures::future::join_all(providers.iter().map(|p| async move {
            (p.base_url.clone(), probe.check(p, timeout).await)
        }))
        .await;

        let mut healthy = 0;
        for (base_url, liveness) in results {
            debug!(provider = %base_url, ?liveness, "probed");
            if liveness == Liveness::Healthy {
                healthy += 1;
            }
            self.set_liveness(&base_url, liveness);
        }

        let checked_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        info!(
            healthy,
            total = providers.len(),
            %checked_at,
            "provider health probe finished"
        );
        healthy
    }

    pub fn snapshot(&self) -> Vec<ProviderStatus> {
        self.entries
            .read()
            .iter()
            .map(|e| ProviderStatus {
                provider: e.provider.clone(),
                successes: e.successes,
                failures: e.failures,
                failure_streak: e.failure_streak,
            })
            .collect()
    }

    pub fn status_of(&self, base_url: &str) -> Option<ProviderStatus> {
        self.snapshot()
            .into_iter()
            .find(|s| s.provider.base_url == base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn providers(n: usize) -> Vec<Provider> {
        (0..n)
            .map(|i| Provider::piped(format!("https://p{}.example", i)))
            .collect()
    }

    #[test]
    fn test_fixed_order_and_dedup() {
        let mut list = providers(3);
        list.push(Provider::piped("https://p0.example/"));
        let registry = ProviderRegistry::new(list);

        assert_eq!(registry.len(), 3);
        let urls: Vec<String> = registry
            .candidates(CandidateOrder::Fixed)
            .into_iter()
            .map(|p| p.base_url)
            .collect();
        assert_eq!(
            urls,
            vec!["https://p0.example", "https://p1.example", "https://p2.example"]
        );
    }

    #[test]
    fn test_shuffle_keeps_every_provider() {
        let registry = ProviderRegistry::new(providers(8));
        let mut urls: Vec<String> = registry
            .candidates(CandidateOrder::Shuffled)
            .into_iter()
            .map(|p| p.base_url)
            .collect();
        urls.sort();
        assert_eq!(urls.len(), 8);
        urls.dedup();
        assert_eq!(urls.len(), 8);
    }

    #[test]
    fn test_failures_sort_later_but_never_exclude() {
        let list = providers(3);
        let registry = ProviderRegistry::new(list.clone());

        registry.mark_result(&list[0], false);
        registry.mark_result(&list[0], false);
        registry.mark_result(&list[1], false);

        for _ in 0..10 {
            let ranked = registry.candidates(CandidateOrder::HealthRanked);
            assert_eq!(ranked.len(), 3);
            assert_eq!(ranked[0].base_url, list[2].base_url);
            assert_eq!(ranked[1].base_url, list[1].base_url);
            assert_eq!(ranked[2].base_url, list[0].base_url);
        }
    }

    #[test]
    fn test_success_resets_streak() {
        let list = providers(1);
        let registry = ProviderRegistry::new(list.clone());

        registry.mark_result(&list[0], false);
        registry.mark_result(&list[0], true);

        let status = registry.status_of(&list[0].base_url).unwrap();
        assert_eq!(status.failures, 1);
        assert_eq!(status.successes, 1);
        assert_eq!(status.failure_streak, 0);
        assert_eq!(status.provider.liveness, Liveness::Healthy);
    }

    #[test]
    fn test_old_failures_decay() {
        let list = providers(2);
        let registry = ProviderRegistry::with_failure_decay(list.clone(), Duration::ZERO);

        registry.mark_result(&list[0], false);
        std::thread::sleep(Duration::from_millis(5));

        // With zero decay the streak no longer counts, so ranking falls back to liveness
        registry.set_liveness(&list[1].base_url, Liveness::Unreachable);
        let ranked = registry.candidates(CandidateOrder::HealthRanked);
        assert_eq!(ranked[0].base_url, list[0].base_url);
    }

    struct HalfHealthy;

    #[async_trait]
    impl HealthProbe for HalfHealthy {
        async fn check(&self, provider: &Provider, _timeout: Duration) -> Liveness {
            if provider.base_url.ends_with("p0.example") {
                Liveness::Healthy
            } else {
                Liveness::Unreachable
            }
        }
    }

    #[tokio::test]
    async fn test_probe_all_records_liveness() {
        let list = providers(2);
        let registry = ProviderRegistry::new(list.clone());

        let healthy = registry
            .probe_all(&HalfHealthy, Duration::from_secs(1))
            .await;
        assert_eq!(healthy, 1);

        let p0 = registry.status_of(&list[0].base_url).unwrap();
        assert_eq!(p0.provider.liveness, Liveness::Healthy);
        assert!(p0.provider.last_checked.is_some());

        let p1 = registry.status_of(&list[1].base_url).unwrap();
        assert_eq!(p1.provider.liveness, Liveness::Unreachable);

        let ranked = registry.candidates(CandidateOrder::HealthRanked);
        assert_eq!(ranked[0].base_url, list[0].base_url);
    }
}
