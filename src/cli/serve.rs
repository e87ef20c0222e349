//! `serve` command: build the project, then serve the output locally

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::config::{Config, DevConfig, FrameworkSelection};
use crate::frameworks::BuiltinDetector;
use crate::orchestrator::{prepare_internal_dir, Orchestrator, ShellBuildRunner, Timeline};
use crate::prompt::TerminalChooser;
use crate::settings::{detect_server_settings, DevFlags, Project, ServerSettings};

/// Build the site and serve the result as it would be deployed
#[derive(Args, Debug, Default, Clone)]
pub struct ServeCommand {
    /// Port of the local proxy
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port of the built-in static server
    #[arg(long)]
    pub static_server_port: Option<u16>,

    /// Port of the functions runtime
    #[arg(long)]
    pub functions_port: Option<u16>,

    /// Functions directory
    #[arg(short, long)]
    pub functions: Option<PathBuf>,
}

impl ServeCommand {
    /// `[dev]` settings for serving the build output
    pub fn dev_config(&self, config: &Config) -> DevConfig {
        let mut dev = config.effective_dev_config();
        // The build output is always served as static files
        dev.framework = FrameworkSelection::Static;
        dev.command = None;
        dev.target_port = None;
        if let Some(port) = self.port {
            dev.port = Some(port);
        }
        if let Some(port) = self.static_server_port {
            dev.static_server_port = Some(port);
        }
        if let Some(port) = self.functions_port {
            dev.functions_port = Some(port);
        }
        dev
    }

    pub fn flags(&self, cwd: &Path) -> DevFlags {
        DevFlags {
            dir: None,
            functions: self.functions.as_ref().map(|dir| cwd.join(dir)),
            serving_build: true,
        }
    }

    /// Reset the internal directory, then resolve settings against it
    pub async fn resolve(&self, config: &Config, cwd: &Path) -> Result<ServerSettings> {
        prepare_internal_dir(config)?;

        let detector = BuiltinDetector::new();
        let chooser = TerminalChooser;
        let project = Project::new(config, &detector, &chooser);
        detect_server_settings(&self.dev_config(config), &self.flags(cwd), &project).await
    }

    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        let settings = self.resolve(&config, &std::env::current_dir()?).await?;

        Orchestrator::new(&config, &ShellBuildRunner)
            .run(Timeline::Build, settings)
            .await
    }
}
