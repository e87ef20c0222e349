//! `dev` command: run the framework dev server behind the local proxy

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::config::{Config, DevConfig};
use crate::frameworks::BuiltinDetector;
use crate::orchestrator::{Orchestrator, ShellBuildRunner, Timeline};
use crate::prompt::TerminalChooser;
use crate::settings::{detect_server_settings, DevFlags, Project};

/// Start a local development server
#[derive(Args, Debug, Default, Clone)]
pub struct DevCommand {
    /// Serve files from this directory with the static server
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Port of the local proxy
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Port of the framework dev server
    #[arg(long, alias = "targetPort")]
    pub target_port: Option<u16>,

    /// Port of the built-in static server
    #[arg(long)]
    pub static_server_port: Option<u16>,

    /// Port of the functions runtime
    #[arg(long)]
    pub functions_port: Option<u16>,

    /// Functions directory
    #[arg(short, long)]
    pub functions: Option<PathBuf>,

    /// Framework to use: #auto, #static, #custom or a framework id
    #[arg(long)]
    pub framework: Option<String>,

    /// Command that starts the framework dev server
    #[arg(long)]
    pub command: Option<String>,
}

impl DevCommand {
    /// Overlay the flags onto the `[dev]` settings
    pub fn apply(&self, dev: &mut DevConfig) {
        if let Some(framework) = &self.framework {
            dev.framework = framework.as_str().into();
        }
        if let Some(command) = &self.command {
            dev.command = Some(command.clone());
        }
        if let Some(port) = self.port {
            dev.port = Some(port);
        }
        if let Some(port) = self.target_port {
            dev.target_port = Some(port);
        }
        if let Some(port) = self.static_server_port {
            dev.static_server_port = Some(port);
        }
        if let Some(port) = self.functions_port {
            dev.functions_port = Some(port);
        }
    }

    /// Path flags are taken relative to `cwd`, the directory the CLI was started in
    pub fn flags(&self, cwd: &Path) -> DevFlags {
        DevFlags {
            dir: self.dir.as_ref().map(|dir| cwd.join(dir)),
            functions: self.functions.as_ref().map(|dir| cwd.join(dir)),
            serving_build: false,
        }
    }

    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        let mut dev = config.effective_dev_config();
        self.apply(&mut dev);

        let detector = BuiltinDetector::new();
        let chooser = TerminalChooser;
        let project = Project::new(&config, &detector, &chooser);
        let flags = self.flags(&std::env::current_dir()?);
        let settings = detect_server_settings(&dev, &flags, &project).await?;

        Orchestrator::new(&config, &ShellBuildRunner)
            .run(Timeline::Dev, settings)
            .await
    }
}
