//! netlify-dev - Local development environment for Netlify sites
//!
//! Detects the project's framework, starts its dev server (or a static file
//! server) and proxies it on a single local port.
//!
//! # Commands
//! - `dev`: framework dev server behind the local proxy
//! - `serve`: production build served locally

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netlify_dev::utils::dev_error;
use netlify_dev::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("netlify_dev=debug,tower_http=debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("netlify_dev=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            dev_error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
