//! Local HTTP servers
//!
//! - Static file server for the publish directory, used when no framework
//!   dev server is run
//! - Proxy on the public port, forwarding to the framework server

mod proxy;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::utils::clean_path;

pub use proxy::{proxy_router, start_proxy};

/// Shared server state
struct ServerState {
    /// Directory files are served from
    dist: PathBuf,
}

/// Static file server
pub struct StaticServer {
    dist: PathBuf,
    port: u16,
}

impl StaticServer {
    /// Create a new static server for `dist`
    pub fn new(dist: PathBuf, port: u16) -> Self {
        Self { dist, port }
    }

    /// Build router
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            dist: self.dist.clone(),
        });

        Router::new()
            .fallback(serve_path)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the port and serve in the background
    pub async fn start(&self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to start static server on {}", addr))?;

        info!("Static server listening on http://{}", addr);

        let app = self.router();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.map_err(anyhow::Error::from)
        });

        Ok((addr, handle))
    }
}

/// Serve a file from the publish directory
///
/// `/about` resolves to `about`, `about/index.html` or `about.html`. Misses
/// get the site's `404.html` when it has one.
async fn serve_path(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let relative = clean_path(uri.path());
    let relative = relative.trim_start_matches('/');

    let Some(file_path) = resolve_file(&state.dist, relative).await else {
        return not_found(&state.dist, uri.path()).await;
    };

    match tokio::fs::read(&file_path).await {
        Ok(content) => (
            [(header::CONTENT_TYPE, get_content_type(&file_path))],
            content,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to read file {}: {}", file_path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

async fn resolve_file(dist: &Path, relative: &str) -> Option<PathBuf> {
    let path = dist.join(relative);

    let mut candidates = vec![path.join("index.html")];
    if !relative.is_empty() {
        candidates.insert(0, path.clone());
        candidates.push(path.with_file_name(format!(
            "{}.html",
            path.file_name()?.to_string_lossy()
        )));
    }

    for candidate in candidates {
        if tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Some(candidate);
        }
    }
    None
}

async fn not_found(dist: &Path, path: &str) -> Response {
    debug!("No file for {}", path);

    match tokio::fs::read(dist.join("404.html")).await {
        Ok(content) => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response(),
    }
}

/// Get content type for a file
fn get_content_type(path: &Path) -> &'static str {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
