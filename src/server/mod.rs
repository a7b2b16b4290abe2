//! HTTP trigger surface
//!
//! Thin axum front over the orchestrator. Anything that is not a route is
//! served from the dashboard directory.

mod routes;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::daemon::{TickStats, spawn_interval};
use crate::error::{KaizenError, Result};
use crate::pipeline::Orchestrator;

pub use routes::TriggerRequest;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Routes plus the static dashboard fallback
pub fn router(state: AppState, site_dir: &Path) -> Router {
    routes::api_router()
        .fallback_service(ServeDir::new(site_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!("http", method = %request.method(), uri = %request.uri())
        }))
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn serve(orchestrator: Arc<Orchestrator>, config: &Config) -> Result<()> {
    let interval = config.schedule.loop_interval_secs;
    let ticker = if interval > 0 {
        let stats = Arc::new(TickStats::default());
        let orch = Arc::clone(&orchestrator);
        log::info!("Requesting a loop every {}s", interval);
        Some(spawn_interval(Duration::from_secs(interval), stats, move || orch.request_loop()))
    } else {
        None
    };

    let site_dir = orchestrator.workspace().site_dir.clone();
    let app = router(AppState::new(orchestrator), &site_dir);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| KaizenError::Config(format!("invalid listen address: {}", e)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on {}", addr);

    let served = axum::serve(listener, app).await;
    if let Some(ticker) = ticker {
        ticker.abort();
    }
    served?;
    Ok(())
}
