//! TCP port acquisition
//!
//! A port the user configured is a hard constraint: it is used if free and
//! otherwise the command fails. A default port is only a preference.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;
use tracing::debug;

use crate::error::DevError;

/// Bind `port` on loopback and return the port actually bound
///
/// Port 0 asks the OS for any free port. The listener is dropped
/// immediately, releasing the port for the caller.
async fn probe(port: u16) -> Option<u16> {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
        Ok(listener) => listener.local_addr().ok().map(|addr| addr.port()),
        Err(e) => {
            debug!("Port {} is not available: {}", port, e);
            None
        }
    }
}

/// Check whether `port` can currently be bound on loopback
pub async fn is_port_free(port: u16) -> bool {
    probe(port).await.is_some()
}

/// Find a port to listen on
///
/// With `configured` set, that exact port is returned or
/// [`DevError::PortUnavailable`] is raised with `error_message`. Otherwise
/// `default_port` is tried first, then any free port. A `default_port` of 0
/// means any free port.
pub async fn acquire_port(
    configured: Option<u16>,
    default_port: u16,
    error_message: &str,
) -> Result<u16, DevError> {
    if let Some(port) = configured {
        return match probe(port).await {
            Some(acquired) if acquired == port => Ok(port),
            _ => Err(DevError::PortUnavailable {
                port,
                message: error_message.to_string(),
            }),
        };
    }

    if let Some(port) = probe(default_port).await {
        return Ok(port);
    }

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let port = listener.local_addr()?.port();
    debug!("Port {} is taken, using {} instead", default_port, port);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn occupied() -> (TcpListener, u16) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_configured_free_port_is_honored() {
        let (listener, port) = occupied().await;
        drop(listener);

        let acquired = acquire_port(Some(port), 3999, "unused").await.unwrap();
        assert_eq!(acquired, port);
    }

    #[tokio::test]
    async fn test_configured_busy_port_fails() {
        let (_listener, port) = occupied().await;

        let err = acquire_port(Some(port), 3999, "Could not acquire configured static server port")
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::PortUnavailable { port: p, .. } if p == port));
        assert_eq!(
            err.to_string(),
            format!("Could not acquire configured static server port: '{}' is already in use", port)
        );
    }

    #[tokio::test]
    async fn test_busy_default_port_falls_back() {
        let (_listener, port) = occupied().await;

        let acquired = acquire_port(None, port, "unused").await.unwrap();
        assert_ne!(acquired, port);
        assert_ne!(acquired, 0);
    }

    #[tokio::test]
    async fn test_zero_default_picks_any_port() {
        let acquired = acquire_port(None, 0, "unused").await.unwrap();
        assert_ne!(acquired, 0);
        assert!(is_port_free(acquired).await);
    }
}
