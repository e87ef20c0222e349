//! User-level settings shared by every project

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Overrides the directory holding `config.json`
pub const CONFIG_HOME_ENV: &str = "NETLIFY_CONFIG_HOME";

const SETTINGS_FILE: &str = "config.json";

/// Directory of the user-level settings file
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_HOME_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let dirs = ProjectDirs::from("com", "netlify", "netlify-dev")
        .context("Could not determine the user config directory")?;
    Ok(dirs.config_dir().to_path_buf())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    cli_id: Uuid,
    #[serde(default)]
    telemetry_disabled: bool,
}

/// Anonymous install id and telemetry opt-out
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub cli_id: Uuid,
    pub telemetry_disabled: bool,
    path: PathBuf,
    is_new: bool,
}

impl UserSettings {
    /// Load `config.json` from `dir`, creating it on first run
    pub async fn load_or_init(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);

        let stored = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<StoredSettings>(&content) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let settings = match stored {
            Some(stored) => Self {
                cli_id: stored.cli_id,
                telemetry_disabled: stored.telemetry_disabled,
                path,
                is_new: false,
            },
            None => {
                let settings = Self {
                    cli_id: Uuid::new_v4(),
                    telemetry_disabled: false,
                    path,
                    is_new: true,
                };
                debug!("Generated anonymous id {}", settings.cli_id);
                settings.save().await?;
                settings
            }
        };

        Ok(settings)
    }

    /// Write the settings back to disk
    pub async fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(&StoredSettings {
            cli_id: self.cli_id,
            telemetry_disabled: self.telemetry_disabled,
        })?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Whether this run created the settings
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_first_run_generates_v4_id() {
        let dir = TempDir::new().unwrap();

        let settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        assert!(settings.is_new());
        assert!(!settings.telemetry_disabled);
        assert_eq!(settings.cli_id.get_version_num(), 4);

        let content = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(content.contains("\"cliId\""));
        assert!(content.contains("\"telemetryDisabled\": false"));
    }

    #[tokio::test]
    async fn test_id_is_stable_across_runs() {
        let dir = TempDir::new().unwrap();

        let first = UserSettings::load_or_init(dir.path()).await.unwrap();
        let second = UserSettings::load_or_init(dir.path()).await.unwrap();

        assert!(!second.is_new());
        assert_eq!(first.cli_id, second.cli_id);
    }

    #[tokio::test]
    async fn test_opt_out_persists() {
        let dir = TempDir::new().unwrap();

        let mut settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        settings.telemetry_disabled = true;
        settings.save().await.unwrap();

        let reloaded = UserSettings::load_or_init(dir.path()).await.unwrap();
        assert!(reloaded.telemetry_disabled);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_regenerated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

        let settings = UserSettings::load_or_init(dir.path()).await.unwrap();
        assert!(settings.is_new());

        let reloaded = UserSettings::load_or_init(dir.path()).await.unwrap();
        assert_eq!(settings.cli_id, reloaded.cli_id);
    }
}
