// HTTP health probe

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::resolver::models::{Liveness, Provider};
use crate::resolver::traits::HealthProbe;

pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, provider: &Provider, timeout: Duration) -> Liveness {
        let url = provider.health_url();

        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => Liveness::Healthy,
            Ok(response) => {
                debug!(%url, status = %response.status(), "health check rejected");
                Liveness::Unreachable
            }
            Err(e) => {
                debug!(%url, error = %e, "health check failed");
                Liveness::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_healthy_and_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthcheck"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/stats"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let probe = HttpHealthProbe::new(reqwest::Client::new());
        let timeout = Duration::from_secs(2);

        assert_eq!(
            probe.check(&Provider::piped(server.uri()), timeout).await,
            Liveness::Healthy
        );
        assert_eq!(
            probe.check(&Provider::invidious(server.uri()), timeout).await,
            Liveness::Unreachable
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let probe = HttpHealthProbe::new(reqwest::Client::new());
        let provider = Provider::piped("http://127.0.0.1:9");
        assert_eq!(
            probe.check(&provider, Duration::from_millis(500)).await,
            Liveness::Unreachable
        );
    }
}
