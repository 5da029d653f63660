use std::sync::Arc;

use anyhow::{Context, Result};
use rideshare::{AppState, Config, Messaging, QUEUE_CAPACITY, local_broker, router};
use route_matching::{RouteCache, RouteMatcher};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trip_location::LocationEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let (broker, consumer) = local_broker(QUEUE_CAPACITY);
    let engine = Arc::new(LocationEngine::new(config.engine.clone(), broker));

    let (stop, stopped) = oneshot::channel();
    let consumer = tokio::spawn(consumer.run(Messaging::new(Arc::clone(&engine)), stopped));

    let mut matcher = RouteMatcher::new(config.matching);
    if config.route_cache_enabled {
        matcher = matcher.with_cache(RouteCache::new());
    }

    let app = router(AppState { engine, matcher: Arc::new(matcher) });
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, topic = %config.engine.topic, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("serving")?;

    // drain reports still queued for delivery
    let _ = stop.send(());
    consumer.await.context("joining location consumer")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "installing ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
