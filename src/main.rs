use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard::config::Config;
use taskboard::store::TodoStore;
use taskboard::web;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    let gateway = config
        .open_gateway()
        .with_context(|| format!("opening {:?} backend", config.backend))?;

    let mut store = TodoStore::new(gateway);
    store.load().await.context("loading board")?;
    if config.seed_defaults() {
        store
            .seed_default_categories()
            .await
            .context("seeding default categories")?;
    }

    let app = web::router(Arc::new(Mutex::new(store)));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(backend = ?config.backend, "taskboard running on http://{}", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
