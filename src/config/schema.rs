//! Configuration schema definitions

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the dev server should pick the app to run
///
/// Serialized as a plain string: `#static`, `#auto`, `#custom`, or a
/// framework id such as `gatsby`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameworkSelection {
    /// Always serve files with the built-in static server
    Static,
    /// Detect the framework from the project files
    #[default]
    Auto,
    /// Run the configured `command` and proxy `targetPort`
    Custom,
    /// Use the settings of a specific framework
    Named(String),
}

impl From<String> for FrameworkSelection {
    fn from(value: String) -> Self {
        match value.as_str() {
            "#static" => Self::Static,
            "#auto" | "" => Self::Auto,
            "#custom" => Self::Custom,
            _ => Self::Named(value),
        }
    }
}

impl From<&str> for FrameworkSelection {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<FrameworkSelection> for String {
    fn from(value: FrameworkSelection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FrameworkSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("#static"),
            Self::Auto => f.write_str("#auto"),
            Self::Custom => f.write_str("#custom"),
            Self::Named(id) => f.write_str(id),
        }
    }
}

/// How readiness of the framework port is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PollingStrategy {
    Tcp,
    Http,
}

/// `[build]` section of netlify.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Base directory, relative to the config file
    pub base: Option<PathBuf>,

    /// Build command
    pub command: Option<String>,

    /// Directory with the build output
    pub publish: Option<PathBuf>,

    /// Serverless functions directory
    pub functions: Option<PathBuf>,
}

/// `[dev]` section of netlify.toml, overlaid with CLI flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevConfig {
    /// Framework selection
    pub framework: FrameworkSelection,

    /// Command that starts the framework dev server
    pub command: Option<String>,

    /// Port the proxy listens on
    pub port: Option<u16>,

    /// Port the framework dev server listens on
    pub target_port: Option<u16>,

    /// Port for the built-in static server
    pub static_server_port: Option<u16>,

    /// Port for the functions runtime
    pub functions_port: Option<u16>,

    /// Directory to serve statically
    pub publish: Option<PathBuf>,

    /// Serverless functions directory
    pub functions: Option<PathBuf>,

    /// Key/cert pair for serving over HTTPS
    pub https: Option<HttpsConfig>,

    pub jwt_secret: Option<String>,

    pub jwt_role_path: Option<String>,

    /// How to probe the framework port
    pub polling_strategies: Option<Vec<PollingStrategy>>,
}

/// `[dev.https]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    pub key_file: PathBuf,
    pub cert_file: PathBuf,
}

/// `[[plugins]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// npm package name of the build plugin
    pub package: String,

    /// Plugin-specific inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<toml::Table>,
}
