//! HTTP API server.
//!
//! One axum router; every JSON endpoint renders exactly one envelope.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderMap, Request},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::extractors::{ProcessRunner, ToolRunner, YtDlp};
use crate::utils::normalize_base_url;

pub mod envelope;
pub mod files;
pub mod handlers;

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ytdlp: Arc<YtDlp>,
    pub http: reqwest::Client,
    pub started_at: DateTime<Utc>,
    public_url: Option<Arc<str>>,
}

impl AppState {
    /// Build state around any [`ToolRunner`]
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>) -> Result<Self> {
        let ytdlp = YtDlp::new(
            runner,
            config.storage.download_dir.clone(),
            config.download_timeout(),
            config.query_timeout(),
        );

        let public_url = config
            .server
            .public_url
            .as_deref()
            .map(normalize_base_url)
            .transpose()?
            .map(Arc::from);

        let http = reqwest::Client::builder()
            .user_agent(concat!("universal-downloader-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config: Arc::new(config),
            ytdlp: Arc::new(ytdlp),
            http,
            started_at: Utc::now(),
            public_url,
        })
    }

    /// Base URL for download links: configured public URL, then the request's Host header
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(public_url) = &self.public_url {
            return public_url.to_string();
        }

        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .filter(|v| matches!(*v, "http" | "https"))
            .unwrap_or("http");

        match headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()) {
            Some(host) => format!("{}://{}", scheme, host),
            None => format!("http://{}", self.config.bind_address()),
        }
    }
}

/// Build the Axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    let cors = state.config.server.cors;

    let router = Router::new()
        .route("/", get(handlers::diagnostics))
        .route("/health", get(handlers::health))
        .route("/api/ytmp3", get(handlers::ytmp3))
        .route("/api/ytmp3.php", get(handlers::ytmp3))
        .route("/api/ytmp4", get(handlers::ytmp4))
        .route("/api/ytmp4.php", get(handlers::ytmp4))
        .route("/api/download", get(handlers::download))
        .route("/api/ytsearch", get(handlers::search))
        .route("/api/details", get(handlers::details))
        .route("/download/:filename", get(files::serve_file))
        .route("/downloads/:filename", get(files::serve_file))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }));

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Starts the HTTP server and runs until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.storage.download_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create download directory {}",
                config.storage.download_dir.display()
            )
        })?;

    let runner = Arc::new(ProcessRunner::new(&config.tool.ytdlp_path));
    let state = AppState::new(config, runner)?;
    let addr = state.config.bind_address();

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        addr = %addr,
        download_dir = %state.config.storage.download_dir.display(),
        "HTTP API listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::MockToolRunner;
    use axum::http::HeaderValue;

    fn state(public_url: Option<&str>) -> AppState {
        let mut config = Config::default();
        config.server.public_url = public_url.map(str::to_string);
        AppState::new(config, Arc::new(MockToolRunner::new())).unwrap()
    }

    #[test]
    fn test_base_url_prefers_public_url() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("internal:5000"));
        assert_eq!(
            state(Some("https://dl.example.com/")).base_url(&headers),
            "https://dl.example.com"
        );
    }

    #[test]
    fn test_base_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("api.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(state(None).base_url(&headers), "https://api.example.com");
    }

    #[test]
    fn test_base_url_without_host() {
        assert_eq!(state(None).base_url(&HeaderMap::new()), "http://0.0.0.0:5000");
    }

    #[test]
    fn test_invalid_public_url_is_rejected() {
        let mut config = Config::default();
        config.server.public_url = Some("not a url".to_string());
        assert!(AppState::new(config, Arc::new(MockToolRunner::new())).is_err());
    }
}
