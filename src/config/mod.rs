//! Configuration handling
//!
//! Parses netlify.toml and derives the effective `[dev]` settings for the
//! `dev` and `serve` commands.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use schema::*;

/// Name of the project's internal scratch directory
pub const INTERNAL_DIR: &str = ".netlify";

/// Internal functions folder, inside [`INTERNAL_DIR`]
pub const INTERNAL_FUNCTIONS_FOLDER: &str = "functions-internal";

/// Internal edge functions folder, inside [`INTERNAL_DIR`]
pub const INTERNAL_EDGE_FUNCTIONS_FOLDER: &str = "edge-functions";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Local development settings
    #[serde(default)]
    pub dev: DevConfig,

    /// Build plugins
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,

    /// Path of the loaded config file, if one exists
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path
    ///
    /// A missing file is not an error: the project simply has no
    /// configuration and every setting takes its default.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if !canonical_path.exists() {
            debug!("No config file at {}, using defaults", canonical_path.display());
            return Ok(Self::default_config(root));
        }

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?;

        config.root = root;
        config.path = Some(canonical_path);

        Ok(config)
    }

    /// Create a default configuration rooted at `root`
    pub fn default_config(root: PathBuf) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Directory commands run from: the root, or `[build].base` below it
    pub fn working_dir(&self) -> PathBuf {
        match &self.build.base {
            Some(base) => self.root.join(base),
            None => self.root.clone(),
        }
    }

    /// Get a path inside the internal directory
    pub fn path_in_project(&self, segments: &[&str]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.join(INTERNAL_DIR), |path, segment| path.join(segment))
    }

    /// Get the internal functions directory
    pub fn internal_functions_dir(&self) -> PathBuf {
        self.path_in_project(&[INTERNAL_FUNCTIONS_FOLDER])
    }

    /// `[dev]` settings with `[build]` defaults filled in
    ///
    /// `publish` and `functions` fall back to the build section so that the
    /// dev server serves the same output the build produces.
    pub fn effective_dev_config(&self) -> DevConfig {
        let mut dev = self.dev.clone();
        if dev.publish.is_none() {
            dev.publish = self.build.publish.clone();
        }
        if dev.functions.is_none() {
            dev.functions = self.build.functions.clone();
        }
        dev
    }

    /// Names of the build plugins listed in the config
    pub fn plugin_packages(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.package.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("netlify.toml")).unwrap();

        assert_eq!(config.root, dir.path());
        assert!(config.path.is_none());
        assert_eq!(config.dev, DevConfig::default());
        assert_eq!(config.dev.framework, FrameworkSelection::Auto);
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("netlify.toml");
        fs::write(
            &path,
            r#"
[build]
command = "npm run build"
publish = "dist"
functions = "netlify/functions"

[dev]
framework = "vite"
port = 8080

[[plugins]]
package = "@netlify/plugin-lighthouse"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.path.as_deref(), Some(path.as_path()));
        assert_eq!(config.build.command.as_deref(), Some("npm run build"));
        assert_eq!(config.dev.framework, FrameworkSelection::Named("vite".into()));
        assert_eq!(config.dev.port, Some(8080));
        assert_eq!(
            config.plugin_packages().collect::<Vec<_>>(),
            vec!["@netlify/plugin-lighthouse"]
        );
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("netlify.toml");
        fs::write(&path, "[dev\nport = 1").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("netlify.toml"));
    }

    #[test]
    fn test_effective_dev_config_falls_back_to_build() {
        let mut config = Config::default_config(PathBuf::from("/site"));
        config.build.publish = Some(PathBuf::from("public"));
        config.build.functions = Some(PathBuf::from("functions"));
        config.dev.publish = Some(PathBuf::from("out"));

        let dev = config.effective_dev_config();
        assert_eq!(dev.publish, Some(PathBuf::from("out")));
        assert_eq!(dev.functions, Some(PathBuf::from("functions")));
    }

    #[test]
    fn test_internal_paths() {
        let mut config = Config::default_config(PathBuf::from("/site"));
        assert_eq!(
            config.internal_functions_dir(),
            PathBuf::from("/site/.netlify/functions-internal")
        );

        config.build.base = Some(PathBuf::from("packages/web"));
        assert_eq!(config.working_dir(), PathBuf::from("/site/packages/web"));
    }
}
