//! Anonymous usage telemetry
//!
//! Events are posted in the background and never affect the command's
//! outcome. [`Telemetry::flush`] waits for them before the process exits.

mod settings;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub use settings::{config_dir, UserSettings, CONFIG_HOME_ENV};

const DEFAULT_API_URL: &str = "https://api.netlify.com/api/v1";

/// How long pending events may delay exit
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where events are delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub track: String,
    pub identify: String,
}

impl Endpoints {
    /// Resolve endpoints from the process environment
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve endpoints through `lookup`
    ///
    /// `NETLIFY_TEST_TRACK_URL` and `NETLIFY_TEST_IDENTIFY_URL` win over the
    /// paths derived from `NETLIFY_API_URL`.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api = lookup("NETLIFY_API_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api = api.trim_end_matches('/');

        Self {
            track: lookup("NETLIFY_TEST_TRACK_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| format!("{}/track", api)),
            identify: lookup("NETLIFY_TEST_IDENTIFY_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| format!("{}/identify", api)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackPayload<'a> {
    event: String,
    anonymous_id: &'a Uuid,
    properties: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyPayload<'a> {
    anonymous_id: &'a Uuid,
    traits: Value,
}

/// Handle for sending events during one invocation
pub struct Telemetry {
    client: Option<reqwest::Client>,
    endpoints: Endpoints,
    anonymous_id: Uuid,
    disabled: bool,
    wait_for_delivery: bool,
    pending: Vec<JoinHandle<()>>,
}

impl Telemetry {
    /// Telemetry for the given user settings, configured from the environment
    pub fn new(settings: &UserSettings) -> Self {
        let wait_for_delivery = std::env::var_os("NETLIFY_TEST_TELEMETRY_WAIT").is_some();
        Self::with_endpoints(settings, Endpoints::from_env(), wait_for_delivery)
    }

    pub fn with_endpoints(
        settings: &UserSettings,
        endpoints: Endpoints,
        wait_for_delivery: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| debug!("Telemetry client unavailable: {}", e))
            .ok();

        Self {
            client,
            endpoints,
            anonymous_id: settings.cli_id,
            disabled: settings.telemetry_disabled,
            wait_for_delivery,
            pending: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.client.is_some()
    }

    /// Queue a `cli:<name>` event
    pub fn track(&mut self, name: &str, properties: Value) {
        let payload = TrackPayload {
            event: format!("cli:{}", name),
            anonymous_id: &self.anonymous_id,
            properties,
        };
        let body = serde_json::to_value(&payload);
        let url = self.endpoints.track.clone();
        self.send(url, body);
    }

    /// Queue the install's traits
    pub fn identify(&mut self, traits: Value) {
        let payload = IdentifyPayload {
            anonymous_id: &self.anonymous_id,
            traits,
        };
        let body = serde_json::to_value(&payload);
        let url = self.endpoints.identify.clone();
        self.send(url, body);
    }

    fn send(&mut self, url: String, body: serde_json::Result<Value>) {
        if self.disabled {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not encode telemetry payload: {}", e);
                return;
            }
        };

        self.pending.push(tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Telemetry delivered to {}", url)
                }
                Ok(response) => debug!("Telemetry rejected by {}: {}", url, response.status()),
                Err(e) => debug!("Telemetry to {} failed: {}", url, e),
            }
        }));
    }

    /// Wait for queued events
    ///
    /// Bounded by a short timeout unless `NETLIFY_TEST_TELEMETRY_WAIT` is set.
    pub async fn flush(self) {
        let pending = self.pending;
        let drain = async {
            for handle in pending {
                let _ = handle.await;
            }
        };

        if self.wait_for_delivery {
            drain.await;
        } else if tokio::time::timeout(FLUSH_TIMEOUT, drain).await.is_err() {
            debug!("Gave up waiting for telemetry delivery");
        }
    }
}

/// `<name>/<version>` of this CLI
pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Traits reported for a new install
pub fn install_traits() -> Value {
    serde_json::json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cliVersion": env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::HeaderMap,
        routing::post,
        Json, Router,
    };
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn capture_server() -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/track",
                post(
                    |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        let agent = headers
                            .get("user-agent")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        captured.lock().unwrap().push((agent, body));
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{}", addr), captured)
    }

    fn endpoints(base: &str) -> Endpoints {
        Endpoints {
            track: format!("{}/track", base),
            identify: format!("{}/identify", base),
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        let defaults = Endpoints::resolve(|_| None);
        assert_eq!(defaults.track, "https://api.netlify.com/api/v1/track");
        assert_eq!(defaults.identify, "https://api.netlify.com/api/v1/identify");

        let api = Endpoints::resolve(|name| {
            (name == "NETLIFY_API_URL").then(|| "http://localhost:4000/api/".to_string())
        });
        assert_eq!(api.track, "http://localhost:4000/api/track");

        let test = Endpoints::resolve(|name| match name {
            "NETLIFY_API_URL" => Some("http://localhost:4000".to_string()),
            "NETLIFY_TEST_TRACK_URL" => Some("http://localhost:5000/t".to_string()),
            _ => None,
        });
        assert_eq!(test.track, "http://localhost:5000/t");
        assert_eq!(test.identify, "http://localhost:4000/identify");
    }

    #[test]
    fn test_user_agent() {
        assert_eq!(user_agent(), format!("netlify-dev/{}", env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_track_posts_event() {
        let dir = TempDir::new().unwrap();
        let settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        let (base, captured) = capture_server().await;

        let mut telemetry = Telemetry::with_endpoints(&settings, endpoints(&base), true);
        telemetry.track("command", serde_json::json!({ "command": "dev" }));
        telemetry.flush().await;

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (agent, body) = &captured[0];
        assert_eq!(agent, &user_agent());
        assert_eq!(body["event"], "cli:command");
        assert_eq!(body["anonymousId"], settings.cli_id.to_string());
        assert_eq!(body["properties"]["command"], "dev");
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        settings.telemetry_disabled = true;
        let (base, captured) = capture_server().await;

        let mut telemetry = Telemetry::with_endpoints(&settings, endpoints(&base), true);
        assert!(!telemetry.is_enabled());
        telemetry.track("command", Value::Null);
        telemetry.identify(install_traits());
        telemetry.flush().await;

        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_ignored() {
        let dir = TempDir::new().unwrap();
        let settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut telemetry = Telemetry::with_endpoints(
            &settings,
            endpoints(&format!("http://127.0.0.1:{}", port)),
            false,
        );
        telemetry.track("command", Value::Null);
        telemetry.flush().await;
    }
}
