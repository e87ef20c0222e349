//! Framework process spawning and readiness probing

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::PollingStrategy;
use crate::error::DevError;

/// Delay between two readiness probes
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Build a shell invocation of `command`
pub fn shell_command(command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };

    cmd.envs(env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    cmd
}

/// Start `command` in the background
///
/// The child is killed when the returned handle is dropped.
pub fn spawn_command(command: &str, env: &BTreeMap<String, String>, cwd: &Path) -> Result<Child> {
    debug!("Spawning '{}' in {}", command, cwd.display());
    shell_command(command, env, cwd)
        .spawn()
        .with_context(|| format!("Failed to run command: {}", command))
}

/// Checks if a TCP port accepts connections.
async fn check_tcp(addr: SocketAddr) -> bool {
    match TcpStream::connect(addr).await {
        Ok(_) => true,
        Err(e) => {
            debug!("TCP probe failed for {}: {}", addr, e);
            false
        }
    }
}

/// Checks if an HTTP server answers on the address, whatever the status.
async fn check_http(client: &reqwest::Client, addr: SocketAddr) -> bool {
    let url = format!("http://{}/", addr);
    match client.get(&url).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!("HTTP probe failed for {}: {}", url, e);
            false
        }
    }
}

/// Wait until something listens on `port` on a loopback address
///
/// IPv4 is tried before IPv6 on every round; the address that answered is
/// returned so the proxy can reach the server the same way.
pub async fn wait_for_port(
    port: u16,
    strategies: &[PollingStrategy],
    timeout: Duration,
) -> Result<IpAddr, DevError> {
    let use_http = strategies.contains(&PollingStrategy::Http);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .ok();

    let candidates = [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ];

    let poll = async {
        loop {
            for host in candidates {
                let addr = SocketAddr::new(host, port);
                let open = match (&client, use_http) {
                    (Some(client), true) => check_http(client, addr).await,
                    _ => check_tcp(addr).await,
                };
                if open {
                    return host;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| DevError::FrameworkPortTimeout { port })
}
