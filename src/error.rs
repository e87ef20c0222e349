//! Error types for settings resolution and process orchestration
//!
//! Command handlers work with `anyhow::Result` and attach context; the
//! variants below are the failures callers and tests need to tell apart.

use thiserror::Error;

/// Errors raised while resolving dev settings or starting servers
#[derive(Debug, Error)]
pub enum DevError {
    /// Malformed or conflicting configuration
    #[error("{message}")]
    Validation {
        /// Name of the offending option
        option: String,
        message: String,
    },

    /// A configured port is taken
    #[error("{message}: '{port}' is already in use")]
    PortUnavailable { port: u16, message: String },

    /// Key/cert material could not be loaded
    #[error("{0}")]
    Https(String),

    /// The configured framework id is not known to the detector
    #[error("Unsupported value provided for \"framework\" option: '{id}'. Supported frameworks are: {supported}")]
    UnsupportedFramework { id: String, supported: String },

    /// The build pipeline did not succeed
    #[error("Could not start local server due to a build error: {reason}")]
    BuildFailed { reason: String },

    /// The framework dev server never opened its port
    #[error("Timed out waiting for port '{port}' to be open")]
    FrameworkPortTimeout { port: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DevError {
    pub fn validation(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            option: option.into(),
            message: message.into(),
        }
    }

    /// The option a validation error refers to, if any
    pub fn option(&self) -> Option<&str> {
        match self {
            Self::Validation { option, .. } => Some(option),
            _ => None,
        }
    }
}

/// Quote a config property the way messages refer to it
pub fn format_property(name: &str) -> String {
    format!("\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_unavailable_message() {
        let err = DevError::PortUnavailable {
            port: 8888,
            message: "Could not acquire required \"port\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not acquire required \"port\": '8888' is already in use"
        );
    }

    #[test]
    fn test_validation_option() {
        let err = DevError::validation("targetPort", "bad");
        assert_eq!(err.option(), Some("targetPort"));
        assert_eq!(err.to_string(), "bad");
        assert_eq!(DevError::BuildFailed { reason: "x".into() }.option(), None);
    }
}
