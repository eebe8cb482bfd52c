use std::{convert::Infallible, sync::Arc};

use anyhow::{Context, Result};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use srv_proxy::{
    config::ProxyConfig, forward::Forwarder, proxy::ServiceProxy, reporter::TracingReporter,
    resolver::hickory, ServiceResolver,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("srv_proxy=info")),
        )
        .init();

    let config = ProxyConfig::from_env().context("Failed to read configuration")?;
    tracing::info!(?config, "Starting srv-proxy");

    let dns = hickory::from_system_config(config.lookup_timeout)
        .context("Failed to read system DNS configuration")?;
    let resolver = ServiceResolver::new(dns)
        .caching_lookups(true)
        .retaining_data_on_failures(true)
        .lookup_timeout(config.lookup_timeout)
        .cache_ttl(config.cache_ttl)
        .reporter(TracingReporter);
    let proxy = Arc::new(ServiceProxy::new(resolver, Forwarder::default()));

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen))?;
    tracing::info!("Listening on {}", config.listen);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                tracing::info!("Shutdown signal received");
                return Ok(());
            }
        };

        let proxy = proxy.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let proxy = proxy.clone();
                async move {
                    let response = proxy.respond(request.method(), request.uri().path()).await;
                    Ok::<_, Infallible>(response)
                }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, "Connection error: {}", e);
            }
        });
    }
}
