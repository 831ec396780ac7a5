// Provider sources - where the instance list comes from

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::resolver::errors::ResolveError;
use crate::resolver::models::{Provider, ProviderKind};
use crate::resolver::traits::ProviderSource;

/// Fixed list, usually straight from configuration
pub struct StaticProviderSource {
    providers: Vec<Provider>,
}

impl StaticProviderSource {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ProviderSource for StaticProviderSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn load(&self) -> Result<Vec<Provider>, ResolveError> {
        Ok(self.providers.clone())
    }
}

/// Public instance list fetched over HTTP.
///
/// Understands a plain array of base URLs (of `kind`), the Piped instance
/// list (`[{"api_url": ...}]`) and the Invidious one (`[[name, {"uri": ...}]]`).
/// Entry shape wins over `kind` when it tells the flavour apart.
pub struct RemoteProviderSource {
    client: reqwest::Client,
    url: String,
    kind: ProviderKind,
    timeout: Duration,
}

impl RemoteProviderSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            client,
            url: url.into(),
            kind,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn parse_list(json: &Value, kind: ProviderKind) -> Vec<Provider> {
        let Some(entries) = json.as_array() else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(url) => Some((url.as_str(), kind)),
                Value::Object(obj) => match (obj.get("api_url"), obj.get("uri")) {
                    (Some(api_url), _) => api_url.as_str().map(|u| (u, ProviderKind::Piped)),
                    (None, Some(uri)) => uri.as_str().map(|u| (u, ProviderKind::Invidious)),
                    (None, None) => None,
                },
                // Invidious: ["host", {"uri": "https://host", ...}]
                Value::Array(pair) => pair
                    .get(1)
                    .and_then(|meta| meta.get("uri"))
                    .and_then(Value::as_str)
                    .map(|u| (u, ProviderKind::Invidious)),
                _ => None,
            })
            .filter(|(url, _)| url.starts_with("http://") || url.starts_with("https://"))
            .map(|(url, kind)| Provider::new(url, kind))
            .collect()
    }
}

#[async_trait]
impl ProviderSource for RemoteProviderSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<Vec<Provider>, ResolveError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ResolveError::Source(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(ResolveError::Source(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ResolveError::Source(format!("invalid instance list: {}", e)))?;

        let providers = Self::parse_list(&json, self.kind);
        if providers.is_empty() {
            return Err(ResolveError::Source(format!(
                "{} listed no usable instances",
                self.url
            )));
        }

        Ok(providers)
    }
}

/// Try `primary`, fall back to `secondary` when it errors or comes back empty
pub async fn load_with_fallback(
    primary: &dyn ProviderSource,
    secondary: &dyn ProviderSource,
) -> Result<Vec<Provider>, ResolveError> {
    match primary.load().await {
        Ok(list) if !list.is_empty() => Ok(list),
        Ok(_) => {
            tracing::warn!(source = primary.name(), "provider source returned nothing");
            secondary.load().await
        }
        Err(e) => {
            tracing::warn!(source = primary.name(), error = %e, "provider source failed");
            secondary.load().await
        }
    }
}
