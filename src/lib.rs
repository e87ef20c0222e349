//! netlify-dev library
//!
//! Server settings resolution, framework detection and the local dev/serve
//! sessions behind the `netlify-dev` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod frameworks;
pub mod orchestrator;
pub mod prompt;
pub mod server;
pub mod settings;
pub mod telemetry;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use error::DevError;
pub use settings::{detect_server_settings, ServerSettings};
