mod analyzer;
mod cache;
mod config;
mod decoder;
mod error;
mod formatter;
mod handlers;
mod logging;
mod middleware;
mod models;
mod routes;
mod shutdown;
mod state;

use analyzer::{EmotionAnalyzer, HttpAnalyzer};
use anyhow::Result;
use config::Config;
use state::AppState;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init(config.debug);

    // Runtime worker threads must not exist yet when the environment changes.
    config.pin_numeric_threads();

    // The blocking HTTP client has to be created and dropped outside the
    // async runtime; `main` keeps a handle until the runtime is gone.
    let analyzer: Arc<dyn EmotionAnalyzer> =
        Arc::new(HttpAnalyzer::new(config.analyzer_url.clone())?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(config, analyzer.clone()));
    drop(runtime);

    result
}

async fn serve(config: Config, analyzer: Arc<dyn EmotionAnalyzer>) -> Result<()> {
    info!("Starting Pathos Emotion API on port {}", config.port);
    info!(
        numeric_threads = config.numeric_threads,
        "Pinned numeric library threads"
    );
    info!("Debug mode: {}", config.debug);
    info!(analyzer = %config.analyzer_url, "Using remote emotion analyzer");

    let addr = config.socket_addr();
    let state = AppState::new(config, analyzer);

    let (bound, server) = warp::serve(routes::routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown::shutdown_signal())?;

    info!("Server started at http://{}", bound);
    server.await;
    info!("Server stopped");

    Ok(())
}
