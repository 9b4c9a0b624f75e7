//! HTTP surface: `POST /compare` and `GET /health`.

pub mod handlers;
pub mod response;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::capture::{ChromeLauncher, Launcher};
use crate::compare::CompareOptions;
use crate::config::ResolvedServeConfig;

/// Shared by all requests. Each comparison still launches its own browser;
/// `browsers` bounds how many run at once.
pub struct AppState<L> {
    pub launcher: Arc<L>,
    pub browsers: Arc<Semaphore>,
    /// Defaults for fields a request leaves out.
    pub options: CompareOptions,
}

impl<L> AppState<L> {
    pub fn new(launcher: L, max_browsers: usize, options: CompareOptions) -> Self {
        Self {
            launcher: Arc::new(launcher),
            browsers: Arc::new(Semaphore::new(max_browsers.max(1))),
            options,
        }
    }
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: Arc::clone(&self.launcher),
            browsers: Arc::clone(&self.browsers),
            options: self.options.clone(),
        }
    }
}

pub fn router<L: Launcher>(state: AppState<L>) -> Router {
    Router::new()
        .route("/compare", post(handlers::compare::<L>))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// `pagediff serve`: bind, serve until Ctrl-C, then drain in-flight requests.
pub async fn serve(config: ResolvedServeConfig) -> Result<()> {
    let state = AppState::new(
        ChromeLauncher::new(config.capture),
        config.max_browsers,
        config.options,
    );
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    let addr = listener.local_addr().context("Failed to read listen address")?;
    info!(%addr, max_browsers = config.max_browsers, "server listening");
    println!("Server running on http://localhost:{}", addr.port());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
