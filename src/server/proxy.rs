//! Proxy from the public port to the framework server
//!
//! Bodies are streamed in both directions so event streams and long polls
//! reach the browser as the framework writes them. Upgrade requests
//! (WebSocket HMR) are tunneled once the framework answers `101`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper::upgrade::OnUpgrade;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::settings::ServerSettings;

/// Path prefix handled by the functions runtime
const FUNCTIONS_PREFIX: &str = "/.netlify/functions/";

/// Headers that describe one connection, not the message
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

type HttpClient = Client<HttpConnector, Body>;

struct ProxyState {
    client: HttpClient,
    /// Base URL of the framework or static server
    target: String,
    /// Base URL of the functions runtime
    functions_target: Option<String>,
}

/// Build a router forwarding every request to `target`
///
/// Requests under `/.netlify/functions/` go to `functions_target` when set.
pub fn proxy_router(target: String, functions_target: Option<String>) -> Router {
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

    let state = Arc::new(ProxyState {
        client,
        target,
        functions_target,
    });

    Router::new()
        .fallback(proxy_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_upgrade(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
        && headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn bad_gateway(message: String) -> Response {
    warn!("{}", message);
    (StatusCode::BAD_GATEWAY, message).into_response()
}

async fn proxy_request(State(state): State<Arc<ProxyState>>, mut req: Request<Body>) -> Response {
    let base = match &state.functions_target {
        Some(functions) if req.uri().path().starts_with(FUNCTIONS_PREFIX) => functions,
        _ => &state.target,
    };
    let url = format!(
        "{}{}",
        base,
        req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    );
    let uri: Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => return bad_gateway(format!("Invalid upstream URL {}: {}", url, e)),
    };

    let client_upgrade = is_upgrade(req.headers()).then(|| hyper::upgrade::on(&mut req));

    let (mut parts, body) = req.into_parts();
    debug!("Proxying {} {}", parts.method, url);

    parts.uri = uri;
    parts.version = Version::HTTP_11;
    parts.headers.remove(header::HOST);
    if client_upgrade.is_none() {
        strip_hop_by_hop(&mut parts.headers);
    }

    let upstream = match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => upstream,
        Err(e) => return bad_gateway(format!("Could not proxy request to {}: {}", url, e)),
    };

    if let (StatusCode::SWITCHING_PROTOCOLS, Some(client_upgrade)) =
        (upstream.status(), client_upgrade)
    {
        return tunnel(client_upgrade, upstream);
    }

    let (mut parts, body) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Answer `101` and splice the browser and framework connections
fn tunnel(client_upgrade: OnUpgrade, mut upstream: hyper::Response<hyper::body::Incoming>) -> Response {
    let upstream_upgrade = hyper::upgrade::on(&mut upstream);

    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok((client, server)) => {
                let mut client = TokioIo::new(client);
                let mut server = TokioIo::new(server);
                if let Err(e) = tokio::io::copy_bidirectional(&mut client, &mut server).await {
                    debug!("Upgraded connection closed: {}", e);
                }
            }
            Err(e) => warn!("Could not upgrade proxied connection: {}", e),
        }
    });

    let (parts, _) = upstream.into_parts();
    Response::from_parts(parts, Body::empty())
}

/// Start the proxy on the settings' public port
///
/// Serves HTTPS when key/cert material was loaded, plain HTTP otherwise.
pub async fn start_proxy(settings: &ServerSettings) -> Result<JoinHandle<Result<()>>> {
    let host = settings
        .framework_host
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let target = format!("http://{}", SocketAddr::new(host, settings.framework_port));
    let functions_target = settings
        .functions_port
        .map(|port| format!("http://{}", SocketAddr::from((Ipv4Addr::LOCALHOST, port))));

    let app = proxy_router(target.clone(), functions_target);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, settings.port));

    let handle = match &settings.https {
        Some(https) => {
            // Both reqwest and axum-server link rustls; pick the provider explicitly
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls = RustlsConfig::from_pem(
                https.cert.clone().into_bytes(),
                https.key.clone().into_bytes(),
            )
            .await
            .with_context(|| {
                format!(
                    "Invalid HTTPS material in {} / {}",
                    https.cert_file_path.display(),
                    https.key_file_path.display()
                )
            })?;

            info!("Proxy listening on https://{} -> {}", addr, target);
            tokio::spawn(async move {
                axum_server::bind_rustls(addr, tls)
                    .serve(app.into_make_service())
                    .await
                    .map_err(anyhow::Error::from)
            })
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to start proxy on {}", addr))?;

            info!("Proxy listening on http://{} -> {}", addr, target);
            tokio::spawn(async move { axum::serve(listener, app).await.map_err(anyhow::Error::from) })
        }
    };

    Ok(handle)
}
