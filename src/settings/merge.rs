//! Merging detected framework settings with user overrides

use std::path::Path;

use crate::config::DevConfig;
use crate::error::DevError;
use crate::frameworks::FrameworkInfo;
use crate::utils::acquire_port;

use super::{default_dist, BaseServerSettings, DEFAULT_STATIC_PORT};

/// Acquire the port for the built-in static server
pub(crate) async fn static_server_port(dev_config: &DevConfig) -> Result<u16, DevError> {
    acquire_port(
        dev_config.static_server_port,
        DEFAULT_STATIC_PORT,
        "Could not acquire configured static server port",
    )
    .await
}

/// Combine a framework's settings with the user's `[dev]` overrides
///
/// A command and a port are both needed to run a framework server. When
/// either is missing the result serves `dist` with the static server instead.
pub async fn merge_settings(
    dev_config: &DevConfig,
    framework: Option<&FrameworkInfo>,
    working_dir: &Path,
) -> Result<BaseServerSettings, DevError> {
    let command = dev_config
        .command
        .clone()
        .or_else(|| framework.and_then(|f| f.dev_command.clone()));
    let target_port = dev_config
        .target_port
        .or_else(|| framework.and_then(|f| f.framework_port));

    let (use_static_server, framework_port) = match (&command, target_port) {
        (Some(_), Some(port)) => (false, port),
        _ => (true, static_server_port(dev_config).await?),
    };

    let dist = match (&dev_config.publish, framework.and_then(|f| f.dist.as_ref())) {
        (Some(publish), _) => working_dir.join(publish),
        (None, Some(dist)) => working_dir.join(dist),
        (None, None) => default_dist(working_dir),
    };

    Ok(BaseServerSettings {
        command,
        framework_port,
        dist,
        framework: framework.map(|f| f.name.clone()),
        env: framework.map(|f| f.env.clone()).unwrap_or_default(),
        polling_strategies: dev_config
            .polling_strategies
            .clone()
            .or_else(|| framework.map(|f| f.polling_strategies.clone()))
            .unwrap_or_default(),
        plugins: Vec::new(),
        use_static_server,
    })
}
