//! Build and dev timelines
//!
//! Takes resolved [`ServerSettings`] and brings the session up: optionally
//! runs the project build, starts the framework dev server or the static
//! server, waits for it to listen and puts the proxy in front of it.

mod process;

use std::future::pending;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{
    Config, INTERNAL_DIR, INTERNAL_EDGE_FUNCTIONS_FOLDER, INTERNAL_FUNCTIONS_FOLDER,
};
use crate::error::{format_property, DevError};
use crate::server::{start_proxy, StaticServer};
use crate::settings::ServerSettings;
use crate::utils::{dev_error, dev_log, dev_warn, format_duration, relative_path};

pub use process::{shell_command, spawn_command, wait_for_port};

/// How long a framework dev server gets to open its port
pub const FRAMEWORK_PORT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Copy of the active config used by the local session
const INTERNAL_CONFIG_FILE: &str = "netlify.toml";

/// Which pipeline brings the session up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeline {
    /// Full build, then serve the output statically
    Build,
    /// Run the framework dev server directly
    Dev,
}

/// Runs the project build for the build timeline
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn run(&self, config: &Config, settings: &ServerSettings) -> Result<(), DevError>;
}

/// Runs `[build].command` in a shell
pub struct ShellBuildRunner;

#[async_trait]
impl BuildRunner for ShellBuildRunner {
    async fn run(&self, config: &Config, settings: &ServerSettings) -> Result<(), DevError> {
        let Some(command) = &config.build.command else {
            dev_log("No build command configured, serving the publish directory as is");
            return Ok(());
        };

        dev_log(format!("Running build command: {}", command.cyan()));

        let status = shell_command(command, &settings.env, &config.working_dir())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(DevError::BuildFailed {
                reason: format!("'{}' exited with {}", command, status),
            })
        }
    }
}

/// Reset the internal directory and snapshot the active config into it
pub fn prepare_internal_dir(config: &Config) -> Result<()> {
    for folder in [INTERNAL_FUNCTIONS_FOLDER, INTERNAL_EDGE_FUNCTIONS_FOLDER] {
        let path = config.path_in_project(&[folder]);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to clean {}", path.display()))
            }
        }
    }

    let internal_config = config.path_in_project(&[INTERNAL_CONFIG_FILE]);
    match std::fs::remove_file(&internal_config) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to clean {}", internal_config.display()))
        }
    }

    if let Some(path) = &config.path {
        let internal_dir = config.root.join(INTERNAL_DIR);
        std::fs::create_dir_all(&internal_dir)
            .with_context(|| format!("Failed to create {}", internal_dir.display()))?;
        std::fs::copy(path, &internal_config).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                path.display(),
                internal_config.display()
            )
        })?;
    }

    Ok(())
}

/// Framework side of a running session
pub struct RunningFramework {
    /// Loopback address the framework answered on
    pub host: IpAddr,
    /// Spawned framework command, if any
    pub child: Option<Child>,
    /// Built-in static server task, if used
    pub static_server: Option<JoinHandle<Result<()>>>,
}

/// Start the app behind the proxy and wait until it listens
pub async fn start_framework_server(
    settings: &ServerSettings,
    cwd: &Path,
) -> Result<RunningFramework> {
    if settings.use_static_server {
        let child = match &settings.command {
            Some(command) => {
                dev_log(format!("Running command: {}", command.cyan()));
                Some(spawn_command(command, &settings.env, cwd)?)
            }
            None => None,
        };

        let server = StaticServer::new(settings.dist.clone(), settings.framework_port);
        let (addr, handle) = server.start().await?;
        let base = cwd.parent().unwrap_or(cwd);
        dev_log(format!(
            "Static server serving \"{}\" on {}",
            relative_path(base, &settings.dist)
                .unwrap_or_else(|| settings.dist.display().to_string()),
            addr
        ));

        return Ok(RunningFramework {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            child,
            static_server: Some(handle),
        });
    }

    let Some(command) = &settings.command else {
        return Err(DevError::validation(
            "command",
            format!("No {} to start the framework server", format_property("command")),
        )
        .into());
    };

    dev_log(format!(
        "Starting Netlify Dev with {}",
        settings.framework.as_deref().unwrap_or("custom config")
    ));
    dev_log(format!("Running command: {}", command.cyan()));

    let mut child = spawn_command(command, &settings.env, cwd)?;

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Waiting for framework port {}. This can be configured using the {} property in the netlify.toml",
        settings.framework_port,
        format_property("targetPort")
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let waited = tokio::select! {
        status = child.wait() => {
            spinner.finish_and_clear();
            let status = status.context("Failed to wait for framework command")?;
            anyhow::bail!("Command '{}' exited with {} before opening port {}", command, status, settings.framework_port);
        }
        host = wait_for_port(settings.framework_port, &settings.polling_strategies, FRAMEWORK_PORT_TIMEOUT) => host,
    };
    spinner.finish_and_clear();

    match waited {
        Ok(host) => {
            info!("Framework server answered on {}:{}", host, settings.framework_port);
            Ok(RunningFramework {
                host,
                child: Some(child),
                static_server: None,
            })
        }
        Err(e) => {
            dev_error(format!(
                "Netlify Dev could not start or connect to localhost:{}.",
                settings.framework_port
            ));
            dev_error(format!(
                "Please make sure your framework server is running on port {}",
                settings.framework_port
            ));
            dev_error(format!(
                "If you are using a custom framework, set {} to {} and {} to the port your server listens on",
                format_property("framework"),
                format_property("#custom"),
                format_property("targetPort")
            ));
            Err(e.into())
        }
    }
}

async fn wait_child(child: &mut Option<Child>) -> std::io::Result<ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => pending().await,
    }
}

async fn wait_task(task: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    match task {
        Some(task) => task.await.context("Server task panicked")?,
        None => pending().await,
    }
}

/// Drives a session from resolved settings to shutdown
pub struct Orchestrator<'a> {
    config: &'a Config,
    runner: &'a dyn BuildRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn BuildRunner) -> Self {
        Self { config, runner }
    }

    /// Run the project build
    ///
    /// The internal directory is reset with [`prepare_internal_dir`] before
    /// settings are resolved, so resolution never sees a previous run's output.
    pub async fn run_build(&self, settings: &ServerSettings) -> Result<()> {
        let start = std::time::Instant::now();

        self.runner.run(self.config, settings).await.map_err(|e| {
            dev_error("Could not start local server due to a build error");
            anyhow::Error::from(e)
        })?;

        dev_log(format!("Build finished in {}", format_duration(start.elapsed())));
        Ok(())
    }

    /// Bring the session up and serve until Ctrl+C or the app exits
    pub async fn run(&self, timeline: Timeline, mut settings: ServerSettings) -> Result<()> {
        if timeline == Timeline::Build {
            self.run_build(&settings).await?;
            settings.command = None;
            settings.use_static_server = true;
        }

        let mut framework = start_framework_server(&settings, &self.config.working_dir()).await?;
        settings.framework_host = Some(framework.host);

        let mut proxy = Some(start_proxy(&settings).await?);

        if let (Some(functions), Some(port)) = (&settings.functions, settings.functions_port) {
            dev_log(format!(
                "Functions from {} are expected on port {}",
                functions.display(),
                port
            ));
        }
        if !settings.plugins.is_empty() {
            dev_warn(format!(
                "Recommended build plugins not installed: {}",
                settings.plugins.join(", ")
            ));
        }

        let scheme = if settings.https.is_some() { "https" } else { "http" };
        eprintln!(
            "\n{} {}\n",
            "◈ Server now ready on".green().bold(),
            format!("{}://localhost:{}", scheme, settings.port).cyan().underline()
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                dev_log("Shutting down");
                Ok(())
            }
            status = wait_child(&mut framework.child) => {
                let status = status.context("Failed to wait for framework command")?;
                dev_warn(format!("Framework command exited with {}", status));
                Ok(())
            }
            result = wait_task(&mut framework.static_server) => {
                result.context("Static server stopped")
            }
            result = wait_task(&mut proxy) => {
                result.context("Proxy server stopped")
            }
        }
    }
}
