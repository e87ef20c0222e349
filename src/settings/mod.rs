//! Dev server settings resolution
//!
//! Reconciles the `[dev]` config, CLI flags, framework detection and port
//! availability into one [`ServerSettings`] value. The branch is chosen by
//! `--dir` and the [`FrameworkSelection`]; everything after the branch
//! (public port, functions, HTTPS) is shared.

mod https;
mod merge;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Config, DevConfig, FrameworkSelection, PollingStrategy};
use crate::error::{format_property, DevError};
use crate::frameworks::{FrameworkDetector, FrameworkInfo};
use crate::prompt::{pin_choice_hint, FrameworkChooser};
use crate::utils::{acquire_port, dev_log, dev_warn, relative_path};

pub use https::{read_https_settings, HttpsSettings};
pub use merge::merge_settings;

use merge::static_server_port;

/// Default port of the proxy users open in the browser
pub const DEFAULT_PORT: u16 = 8888;

/// Default port of the built-in static server
pub const DEFAULT_STATIC_PORT: u16 = 3999;

pub const DEFAULT_JWT_SECRET: &str = "secret";
pub const DEFAULT_JWT_ROLE_PATH: &str = "app_metadata.authorization.roles";

/// Settings produced by one resolution branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseServerSettings {
    /// Command starting the app's dev server
    pub command: Option<String>,

    /// Port the framework server (or the static server) listens on
    pub framework_port: u16,

    /// Directory served by the static server
    pub dist: PathBuf,

    /// Display name of the framework, or `#custom`
    pub framework: Option<String>,

    /// Extra environment for `command`
    pub env: BTreeMap<String, String>,

    pub polling_strategies: Vec<PollingStrategy>,

    /// Build plugins to auto-install
    pub plugins: Vec<String>,

    pub use_static_server: bool,
}

/// Fully resolved settings for a dev session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub command: Option<String>,
    pub framework_port: u16,
    pub dist: PathBuf,
    pub framework: Option<String>,
    pub env: BTreeMap<String, String>,
    pub polling_strategies: Vec<PollingStrategy>,
    pub plugins: Vec<String>,
    pub use_static_server: bool,

    /// Port of the proxy
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_role_path: String,

    /// Functions directory, if one is configured
    pub functions: Option<PathBuf>,

    /// Port for the functions runtime, set when there are functions to serve
    pub functions_port: Option<u16>,

    pub https: Option<HttpsSettings>,

    /// Loopback address the framework server answered on
    pub framework_host: Option<IpAddr>,
}

/// Flags of the `dev` command that are not `[dev]` overrides
///
/// Relative paths are taken from the project working directory. The CLI
/// passes them absolute, resolved from the directory it was started in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevFlags {
    /// Serve this directory with the static server
    pub dir: Option<PathBuf>,

    /// Functions directory
    pub functions: Option<PathBuf>,

    /// The static server is serving a fresh build (`serve`), not chosen by the user
    pub serving_build: bool,
}

/// Everything resolution needs to know about the project
pub struct Project<'a> {
    pub config: &'a Config,
    pub detector: &'a dyn FrameworkDetector,
    pub chooser: &'a dyn FrameworkChooser,
}

impl<'a> Project<'a> {
    pub fn new(
        config: &'a Config,
        detector: &'a dyn FrameworkDetector,
        chooser: &'a dyn FrameworkChooser,
    ) -> Self {
        Self {
            config,
            detector,
            chooser,
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.config.working_dir()
    }
}

/// Resolve the settings for a dev session
pub async fn detect_server_settings(
    dev_config: &DevConfig,
    flags: &DevFlags,
    project: &Project<'_>,
) -> Result<ServerSettings> {
    validate_framework_config(dev_config)?;

    let working_dir = project.working_dir();

    let base = match (&flags.dir, &dev_config.framework) {
        (Some(_), _) | (None, FrameworkSelection::Static) => {
            handle_static_server(dev_config, flags, &working_dir).await?
        }
        (None, FrameworkSelection::Auto) => handle_auto(dev_config, flags, project).await?,
        (None, FrameworkSelection::Custom) => handle_custom_framework(dev_config, &working_dir)?,
        (None, FrameworkSelection::Named(id)) => {
            let framework = project.detector.get_framework(id, &working_dir).await?;
            let mut settings = merge_settings(dev_config, Some(&framework), &working_dir).await?;
            settings.plugins = plugins_to_auto_install(&framework, project.config);
            settings
        }
    };

    validate_configured_port(dev_config, base.framework_port)?;

    let port = acquire_port(
        dev_config.port,
        DEFAULT_PORT,
        &format!("Could not acquire required {}", format_property("port")),
    )
    .await?;

    let functions = functions_dir(dev_config, flags, &working_dir);
    let functions_port = if has_functions(functions.as_deref(), &project.config.internal_functions_dir()) {
        Some(
            acquire_port(
                dev_config.functions_port,
                0,
                &format!("Could not acquire configured {}", format_property("functionsPort")),
            )
            .await?,
        )
    } else {
        None
    };

    let https = match &dev_config.https {
        Some(https) => Some(
            read_https_settings(https, &project.config.root)
                .await
                .context("Failed to load HTTPS settings")?,
        ),
        None => None,
    };

    let BaseServerSettings {
        command,
        framework_port,
        dist,
        framework,
        env,
        polling_strategies,
        plugins,
        use_static_server,
    } = base;

    let settings = ServerSettings {
        command,
        framework_port,
        dist,
        framework,
        env,
        polling_strategies,
        plugins,
        use_static_server,
        port,
        jwt_secret: dev_config
            .jwt_secret
            .clone()
            .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
        jwt_role_path: dev_config
            .jwt_role_path
            .clone()
            .unwrap_or_else(|| DEFAULT_JWT_ROLE_PATH.to_string()),
        functions,
        functions_port,
        https,
        framework_host: None,
    };

    debug!("Resolved server settings: {:?}", settings);

    Ok(settings)
}

/// Check the `[dev]` options that must agree with each other
fn validate_framework_config(dev_config: &DevConfig) -> Result<(), DevError> {
    if let (Some(port), Some(target_port)) = (dev_config.port, dev_config.target_port) {
        if port == target_port {
            return Err(DevError::validation(
                "targetPort",
                format!(
                    "{} and {} options cannot have same values. \
                     The dev server proxies from {} to the app listening on {}",
                    format_property("port"),
                    format_property("targetPort"),
                    format_property("port"),
                    format_property("targetPort"),
                ),
            ));
        }
    }
    Ok(())
}

/// The proxy cannot listen on the port the app itself uses
fn validate_configured_port(dev_config: &DevConfig, framework_port: u16) -> Result<(), DevError> {
    if dev_config.port == Some(framework_port) {
        let port = format_property("port");
        return Err(DevError::validation(
            "port",
            format!(
                "The {} option you specified conflicts with the port of your application. \
                 Please use a different value for {}",
                port, port
            ),
        ));
    }
    Ok(())
}

/// Fall back to serving the working directory
pub(crate) fn default_dist(working_dir: &Path) -> PathBuf {
    dev_warn("Unable to determine public folder to serve files from. Using current working directory");
    dev_warn("Setup a netlify.toml file with a [dev] section to specify your dev server settings.");
    working_dir.to_path_buf()
}

/// Serve files with the built-in static server
async fn handle_static_server(
    dev_config: &DevConfig,
    flags: &DevFlags,
    working_dir: &Path,
) -> Result<BaseServerSettings, DevError> {
    if flags.serving_build {
        debug!("Serving the build output with the static server");
    } else if flags.dir.is_some() {
        dev_warn(format!(
            "Using simple static server because {} flag was specified",
            format_property("--dir")
        ));
    } else if dev_config.framework == FrameworkSelection::Static {
        dev_warn(format!(
            "Using simple static server because {} was set to {}",
            format_property("[dev.framework]"),
            format_property("#static")
        ));
    }

    if dev_config.target_port.is_some() {
        dev_warn(format!(
            "Ignoring {} setting since using a simple static server. \
             Use --static-server-port or [dev.staticServerPort] to configure the static server port",
            format_property("targetPort")
        ));
    }

    let dist = match (&flags.dir, &dev_config.publish) {
        (Some(dir), _) => working_dir.join(dir),
        (None, Some(publish)) => working_dir.join(publish),
        (None, None) => default_dist(working_dir),
    };

    let base = working_dir.parent().unwrap_or(working_dir);
    dev_warn(format!(
        "Running static server from \"{}\"",
        relative_path(base, &dist).unwrap_or_else(|| dist.display().to_string())
    ));

    let framework_port = static_server_port(dev_config).await?;

    Ok(BaseServerSettings {
        command: dev_config.command.clone(),
        framework_port,
        dist,
        use_static_server: true,
        ..BaseServerSettings::default()
    })
}

fn has_command_and_target_port(dev_config: &DevConfig) -> bool {
    dev_config.command.is_some() && dev_config.target_port.is_some()
}

/// `#auto`: detect the framework unless the config already says how to run the app
async fn handle_auto(
    dev_config: &DevConfig,
    flags: &DevFlags,
    project: &Project<'_>,
) -> Result<BaseServerSettings> {
    let working_dir = project.working_dir();

    if has_command_and_target_port(dev_config) {
        debug!("Command and targetPort configured, skipping framework detection");
        return Ok(merge_settings(dev_config, None, &working_dir).await?);
    }

    let Some(framework) = detect_framework(project, &working_dir).await? else {
        dev_warn("No app server detected. Using simple static server");
        return Ok(handle_static_server(dev_config, flags, &working_dir).await?);
    };

    let mut settings = merge_settings(dev_config, Some(&framework), &working_dir).await?;
    settings.plugins = plugins_to_auto_install(&framework, project.config);
    Ok(settings)
}

/// Run detection and settle on at most one framework
async fn detect_framework(project: &Project<'_>, working_dir: &Path) -> Result<Option<FrameworkInfo>> {
    let mut candidates = project
        .detector
        .detect(working_dir)
        .await
        .context("Framework detection failed")?;

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => {
            let chosen = project.chooser.choose(&candidates)?;
            dev_log(pin_choice_hint(&chosen));
            Ok(Some(chosen))
        }
    }
}

/// `#custom`: run exactly what the config says
fn handle_custom_framework(dev_config: &DevConfig, working_dir: &Path) -> Result<BaseServerSettings, DevError> {
    let (Some(command), Some(target_port)) = (&dev_config.command, dev_config.target_port) else {
        return Err(DevError::validation(
            "framework",
            format!(
                "{} and {} properties are required when {} is set to {}",
                format_property("command"),
                format_property("targetPort"),
                format_property("framework"),
                format_property("#custom"),
            ),
        ));
    };

    Ok(BaseServerSettings {
        command: Some(command.clone()),
        framework_port: target_port,
        dist: match &dev_config.publish {
            Some(publish) => working_dir.join(publish),
            None => default_dist(working_dir),
        },
        framework: Some(FrameworkSelection::Custom.to_string()),
        polling_strategies: dev_config.polling_strategies.clone().unwrap_or_default(),
        ..BaseServerSettings::default()
    })
}

/// Recommended plugins the config does not already list
fn plugins_to_auto_install(framework: &FrameworkInfo, config: &Config) -> Vec<String> {
    framework
        .plugins_recommended
        .iter()
        .filter(|plugin| !config.plugin_packages().any(|p| p == plugin.as_str()))
        .cloned()
        .collect()
}

/// The functions directory: `--functions`, then `[dev]`/`[build]` functions
fn functions_dir(dev_config: &DevConfig, flags: &DevFlags, working_dir: &Path) -> Option<PathBuf> {
    flags
        .functions
        .as_ref()
        .or(dev_config.functions.as_ref())
        .map(|dir| working_dir.join(dir))
}

/// Whether any functions directory holds something to serve
fn has_functions(user_dir: Option<&Path>, internal_dir: &Path) -> bool {
    user_dir
        .into_iter()
        .chain(std::iter::once(internal_dir))
        .any(|dir| {
            dir.is_dir()
                && WalkDir::new(dir)
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .next()
                    .is_some()
        })
}
