use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use stream_resolver::resolver::providers::{
    load_with_fallback, HttpHealthProbe, HttpStreamFetcher, RemoteProviderSource,
    StaticProviderSource,
};
use stream_resolver::resolver::utils::build_http_client;
use stream_resolver::resolver::{
    ProviderRegistry, ProviderSource, Resolver, ResolverConfig, ResolverSettings,
    YtDlpExtractor,
};
use stream_resolver::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = ResolverConfig::load().context("loading configuration")?;
    let client = build_http_client(&config.user_agent, config.proxy.as_deref())
        .context("building http client")?;

    let fallback_list = StaticProviderSource::new(config.provider_list());
    let providers = match &config.instances_url {
        Some(url) => {
            let remote =
                RemoteProviderSource::new(client.clone(), url.clone(), config.instances_kind)
                    .with_timeout(config.fetch_timeout());
            load_with_fallback(&remote, &fallback_list).await
        }
        None => fallback_list.load().await,
    }
    .context("loading providers")?;

    let registry = Arc::new(ProviderRegistry::with_failure_decay(
        providers,
        config.failure_decay(),
    ));
    info!(providers = registry.len(), "provider registry ready");

    if config.probe_on_startup {
        let probe = HttpHealthProbe::new(client.clone());
        let healthy = registry.probe_all(&probe, config.probe_timeout()).await;
        if healthy == 0 {
            warn!("no provider answered the health probe, requests may fall back to yt-dlp");
        }
    }

    let extractor = YtDlpExtractor::detect(config.extractor_config())
        .await
        .context("detecting yt-dlp mode")?;
    info!(mode = %extractor.mode(), "fallback extractor");

    let resolver = Resolver::new(
        registry,
        Arc::new(HttpStreamFetcher::new(client)),
        Arc::new(extractor),
        ResolverSettings::from(&config),
    );
    let app = router(AppState {
        resolver: Arc::new(resolver),
    });

    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.parse().with_context(|| format!("invalid PORT {:?}", raw))?,
        Err(_) => 3000,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
