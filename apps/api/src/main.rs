mod config;
mod errors;
mod evaluation;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::evaluation::persistence::JsonFileSink;
use crate::evaluation::quality::RuleBasedEvaluator;
use crate::evaluation::store::EvaluationStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting evaluator v{}", env!("CARGO_PKG_VERSION"));

    // Evaluation log, reloaded from its JSON document if one exists
    let sink = Arc::new(JsonFileSink::new(config.store_path.clone()));
    info!(
        "Evaluation store at {} (persist timeout {:?})",
        sink.path().display(),
        config.persist_timeout
    );
    let store = Arc::new(EvaluationStore::open(sink, config.persist_timeout).await);

    // Rule-based evaluator by default; any QualityEvaluator can be swapped in here
    let evaluator = Arc::new(RuleBasedEvaluator);

    let state = AppState::new(store, evaluator, config.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
