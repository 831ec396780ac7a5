// Resolver configuration - JSON file plus environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::extractors::{ExtractorConfig, ExtractorMode};
use super::models::{Provider, ProviderKind};
use super::registry::CandidateOrder;

/// Explicit config file location
pub const CONFIG_PATH_ENV: &str = "STREAM_RESOLVER_CONFIG";
/// Comma-separated provider base URLs, replaces the configured list.
/// Entries are Piped unless prefixed with `invidious:`.
pub const PROVIDERS_ENV: &str = "STREAM_RESOLVER_PROVIDERS";
pub const PROXY_ENV: &str = "STREAM_RESOLVER_PROXY";
pub const YTDLP_PYTHON_ENV: &str = "YTDLP_PYTHON";
pub const YTDLP_PATH_ENV: &str = "YTDLP_PATH";

const DEFAULT_PROVIDERS: &[&str] = &[
    "https://pipedapi.kavin.rocks",
    "https://pipedapi.mha.fi",
    "https://api.piped.privacydev.net",
    "https://pipedapi.leptons.xyz",
    "https://piped-api.lunar.icu",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    #[serde(default)]
    pub kind: ProviderKind,
}

impl ProviderConfig {
    pub fn piped(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ProviderKind::Piped,
        }
    }

    /// `https://host`, `piped:https://host` or `invidious:https://host`
    pub fn parse(entry: &str) -> Self {
        let (kind, url) = match entry.split_once(':') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("invidious") => {
                (ProviderKind::Invidious, rest)
            }
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case("piped") => {
                (ProviderKind::Piped, rest)
            }
            _ => (ProviderKind::Piped, entry),
        };
        Self {
            url: url.trim().to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    pub mode: ExtractorMode,
    /// yt-dlp binary for CLI mode
    pub program: Option<String>,
    /// Python interpreter for Python mode
    pub python: Option<String>,
    pub cookies_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub providers: Vec<ProviderConfig>,
    /// Remote instance list; the static `providers` list is used when it fails
    pub instances_url: Option<String>,
    /// API flavour of plain URL entries in the remote list. Invidious-style
    /// `[name, {"uri": ..}]` entries are always Invidious.
    pub instances_kind: ProviderKind,
    pub user_agent: String,
    /// HTTP or SOCKS5 proxy for providers and yt-dlp
    pub proxy: Option<String>,
    pub fetch_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub overall_timeout_secs: u64,
    pub probe_on_startup: bool,
    pub provider_order: CandidateOrder,
    pub max_passes: u32,
    pub pass_delay_ms: u64,
    pub failure_decay_secs: u64,
    pub prefer_compatible_audio: bool,
    pub watch_base_url: String,
    pub extractor: ExtractorSettings,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            providers: DEFAULT_PROVIDERS
                .iter()
                .map(|url| ProviderConfig::piped(*url))
                .collect(),
            instances_url: None,
            instances_kind: ProviderKind::Piped,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            proxy: None,
            fetch_timeout_secs: 12,
            probe_timeout_secs: 6,
            fallback_timeout_secs: 30,
            overall_timeout_secs: 45,
            probe_on_startup: true,
            provider_order: CandidateOrder::Shuffled,
            max_passes: 1,
            pass_delay_ms: 1000,
            failure_decay_secs: 300,
            prefer_compatible_audio: false,
            watch_base_url: "https://www.youtube.com".to_string(),
            extractor: ExtractorSettings::default(),
        }
    }
}

impl ResolverConfig {
    /// Explicit path from the environment, else the per-user config file if it
    /// exists, else defaults. Environment overrides are applied last.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match explicit {
            // An explicit path must exist
            Some(path) => Self::from_file(&path)?,
            None => Self::from_default_location()?,
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_default_location() -> Result<Self, ConfigError> {
        Ok(match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply environment-style overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(list) = lookup(PROVIDERS_ENV) {
            self.providers = list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(ProviderConfig::parse)
                .collect();
        }
        if let Some(proxy) = lookup(PROXY_ENV) {
            self.proxy = Some(proxy);
        }
        if let Some(python) = lookup(YTDLP_PYTHON_ENV) {
            self.extractor.python = Some(python);
        }
        if let Some(program) = lookup(YTDLP_PATH_ENV) {
            self.extractor.program = Some(program);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() && self.instances_url.is_none() {
            return Err(ConfigError::Invalid(
                "no providers and no instances_url configured".to_string(),
            ));
        }
        if let Some(bad) = self
            .providers
            .iter()
            .find(|p| !(p.url.starts_with("http://") || p.url.starts_with("https://")))
        {
            return Err(ConfigError::Invalid(format!(
                "provider url must be http(s): {}",
                bad.url
            )));
        }
        if self.max_passes == 0 {
            return Err(ConfigError::Invalid("max_passes must be at least 1".to_string()));
        }
        if self.overall_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        // The fallback is reserved its own slot inside the overall deadline
        if self.fallback_timeout_secs >= self.overall_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "fallback_timeout_secs ({}) must be below overall_timeout_secs ({})",
                self.fallback_timeout_secs, self.overall_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn provider_list(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .map(|p| Provider::new(p.url.clone(), p.kind))
            .collect()
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::default()
            .with_mode(self.extractor.mode)
            .with_proxy(self.proxy.clone())
            .with_cookies_path(self.extractor.cookies_path.clone())
            .with_timeout(self.fallback_timeout_secs)
            .with_user_agent(self.user_agent.clone())
            .with_ytdlp_path(self.extractor.program.clone())
            .with_python_cmd(self.extractor.python.clone())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    pub fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.pass_delay_ms)
    }

    pub fn failure_decay(&self) -> Duration {
        Duration::from_secs(self.failure_decay_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stream-resolver").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_providers(config: ResolverConfig, urls: &[&str]) -> ResolverConfig {
        ResolverConfig {
            providers: urls.iter().map(|url| ProviderConfig::piped(*url)).collect(),
            ..config
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), 5);
        assert_eq!(config.overall_timeout(), Duration::from_secs(45));
        assert_eq!(config.max_passes, 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ResolverConfig = serde_json::from_str(
            r#"{
                "providers": [
                    {"url": "https://inv.example.org", "kind": "invidious"},
                    {"url": "https://piped.example.org"}
                ],
                "provider_order": "health_ranked",
                "extractor": {"mode": "cli"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.provider_order, CandidateOrder::HealthRanked);
        assert_eq!(config.extractor.mode, ExtractorMode::Cli);
        assert_eq!(config.fetch_timeout_secs, 12);

        let providers = config.provider_list();
        assert_eq!(providers[0].kind, ProviderKind::Invidious);
        assert_eq!(providers[1].kind, ProviderKind::Piped);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (
                PROVIDERS_ENV,
                "https://a.example, https://b.example/ ,invidious:https://inv.example",
            ),
            (PROXY_ENV, "socks5h://127.0.0.1:9050"),
            (YTDLP_PYTHON_ENV, "/venv/bin/python"),
            (YTDLP_PATH_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = ResolverConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        let providers = config.provider_list();
        let urls: Vec<&str> = providers.iter().map(|p| p.base_url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example", "https://b.example", "https://inv.example"]
        );
        assert_eq!(providers[0].kind, ProviderKind::Piped);
        assert_eq!(providers[2].kind, ProviderKind::Invidious);
        assert_eq!(config.proxy.as_deref(), Some("socks5h://127.0.0.1:9050"));
        assert_eq!(config.extractor.python.as_deref(), Some("/venv/bin/python"));
        assert_eq!(config.extractor.program, None);

        let extractor = config.extractor_config();
        assert_eq!(extractor.proxy.as_deref(), Some("socks5h://127.0.0.1:9050"));
        assert_eq!(extractor.timeout_seconds, 30);
    }

    #[test]
    fn test_validation() {
        let empty = with_providers(ResolverConfig::default(), &[]);
        assert!(matches!(empty.validate(), Err(ConfigError::Invalid(_))));

        let remote_only = ResolverConfig {
            instances_url: Some("https://piped-instances.kavin.rocks/".to_string()),
            ..with_providers(ResolverConfig::default(), &[])
        };
        assert!(remote_only.validate().is_ok());

        let bad_scheme = with_providers(ResolverConfig::default(), &["ftp://x"]);
        assert!(bad_scheme.validate().is_err());

        let no_provider_budget = ResolverConfig {
            fallback_timeout_secs: 45,
            ..ResolverConfig::default()
        };
        assert!(no_provider_budget.validate().is_err());

        let no_passes = ResolverConfig {
            max_passes: 0,
            ..ResolverConfig::default()
        };
        assert!(no_passes.validate().is_err());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = std::env::temp_dir().join(format!("stream-resolver-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert!(matches!(
            ResolverConfig::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            ResolverConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"max_passes": 2}"#).unwrap();
        assert_eq!(ResolverConfig::from_file(&good).unwrap().max_passes, 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
