//! Framework detection
//!
//! The resolver only talks to the [`FrameworkDetector`] trait. The built-in
//! implementation recognizes frameworks from `package.json` dependencies and
//! well-known config files, and prefers the project's own npm scripts over
//! the framework's bare commands.

pub mod registry;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PollingStrategy;
use crate::error::DevError;

pub use registry::FrameworkDefinition;

/// Settings proposed for one detected framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkInfo {
    pub id: String,
    pub name: String,
    pub build_command: Option<String>,
    /// Command starting the framework's dev server
    pub dev_command: Option<String>,
    /// Port the dev server binds
    pub framework_port: Option<u16>,
    /// Build output directory, relative to the project
    pub dist: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub polling_strategies: Vec<PollingStrategy>,
    /// Build plugins the framework needs
    pub plugins_recommended: Vec<String>,
}

/// Source of framework candidates for a project
#[async_trait]
pub trait FrameworkDetector: Send + Sync {
    /// All frameworks that match the project, best match first
    async fn detect(&self, project_dir: &Path) -> Result<Vec<FrameworkInfo>>;

    /// Settings for a framework chosen by id
    ///
    /// Fails with [`DevError::UnsupportedFramework`] for unknown ids.
    async fn get_framework(&self, id: &str, project_dir: &Path) -> Result<FrameworkInfo, DevError>;
}

/// Subset of package.json the detector reads
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageJson {
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
    scripts: BTreeMap<String, String>,
}

/// Script names tried, in order, when looking for a dev script
const DEV_SCRIPTS: &[&str] = &["dev", "start", "develop", "serve"];

/// What the detector knows about a project directory
struct ProjectFacts {
    dependencies: HashSet<String>,
    scripts: BTreeMap<String, String>,
    package_manager: &'static str,
}

impl ProjectFacts {
    async fn read(project_dir: &Path) -> Result<Self> {
        let package_path = project_dir.join("package.json");
        let package = match tokio::fs::read_to_string(&package_path).await {
            Ok(content) => serde_json::from_str::<PackageJson>(&content)
                .with_context(|| format!("Failed to parse {}", package_path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PackageJson::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", package_path.display()))
            }
        };

        let package_manager = if project_dir.join("pnpm-lock.yaml").exists() {
            "pnpm"
        } else if project_dir.join("yarn.lock").exists() {
            "yarn"
        } else {
            "npm"
        };

        Ok(Self {
            dependencies: package
                .dependencies
                .into_keys()
                .chain(package.dev_dependencies.into_keys())
                .collect(),
            scripts: package.scripts,
            package_manager,
        })
    }

    fn has_dependency(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.dependencies.contains(*name))
    }

    /// A script that runs `command`'s binary, as a package manager invocation
    fn script_for(&self, names: &[&str], command: &str) -> Option<String> {
        let binary = command.split_whitespace().next()?;
        names.iter().find_map(|name| {
            self.scripts
                .get(*name)
                .filter(|script| script.split_whitespace().any(|word| word == binary))
                .map(|_| format!("{} run {}", self.package_manager, name))
        })
    }

    fn info_for(&self, def: &FrameworkDefinition) -> FrameworkInfo {
        FrameworkInfo {
            id: def.id.to_string(),
            name: def.name.to_string(),
            build_command: Some(
                self.script_for(&["build"], def.build_command)
                    .unwrap_or_else(|| def.build_command.to_string()),
            ),
            dev_command: Some(
                self.script_for(DEV_SCRIPTS, def.dev_command)
                    .unwrap_or_else(|| def.dev_command.to_string()),
            ),
            framework_port: Some(def.port),
            dist: Some(PathBuf::from(def.dist)),
            env: def
                .env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            polling_strategies: def.polling_strategies.to_vec(),
            plugins_recommended: def.plugins.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Detector backed by the built-in framework registry
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDetector;

impl BuiltinDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FrameworkDetector for BuiltinDetector {
    async fn detect(&self, project_dir: &Path) -> Result<Vec<FrameworkInfo>> {
        let facts = ProjectFacts::read(project_dir).await?;

        let detected: Vec<FrameworkInfo> = registry::FRAMEWORKS
            .iter()
            .filter(|def| {
                let present = facts.has_dependency(def.npm_dependencies)
                    || def.config_files.iter().any(|f| project_dir.join(f).exists());
                present && !facts.has_dependency(def.excluded_npm_dependencies)
            })
            .map(|def| facts.info_for(def))
            .collect();

        debug!(
            "Detected frameworks in {}: {:?}",
            project_dir.display(),
            detected.iter().map(|f| f.id.as_str()).collect::<Vec<_>>()
        );

        Ok(detected)
    }

    async fn get_framework(&self, id: &str, project_dir: &Path) -> Result<FrameworkInfo, DevError> {
        let def = registry::find(id).ok_or_else(|| DevError::UnsupportedFramework {
            id: id.to_string(),
            supported: registry::supported_ids(),
        })?;

        // An unreadable package.json only loses the script lookup here
        let facts = match ProjectFacts::read(project_dir).await {
            Ok(facts) => facts,
            Err(e) => {
                debug!("Ignoring project files for {}: {:#}", id, e);
                ProjectFacts {
                    dependencies: HashSet::new(),
                    scripts: BTreeMap::new(),
                    package_manager: "npm",
                }
            }
        };

        Ok(facts.info_for(def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project(package_json: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), package_json).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_detect_vite_with_dev_script() {
        let dir = project(
            r#"{
                "scripts": { "dev": "vite --host", "build": "vite build" },
                "devDependencies": { "vite": "^5.0.0" }
            }"#,
        );

        let detected = BuiltinDetector.detect(dir.path()).await.unwrap();
        assert_eq!(detected.len(), 1);

        let vite = &detected[0];
        assert_eq!(vite.id, "vite");
        assert_eq!(vite.dev_command.as_deref(), Some("npm run dev"));
        assert_eq!(vite.build_command.as_deref(), Some("npm run build"));
        assert_eq!(vite.framework_port, Some(5173));
        assert_eq!(vite.dist, Some(PathBuf::from("dist")));
    }

    #[tokio::test]
    async fn test_detect_uses_yarn_when_lockfile_present() {
        let dir = project(r#"{ "scripts": { "develop": "gatsby develop" }, "dependencies": { "gatsby": "5" } }"#);
        fs::write(dir.path().join("yarn.lock"), "").unwrap();

        let detected = BuiltinDetector.detect(dir.path()).await.unwrap();
        assert_eq!(detected[0].dev_command.as_deref(), Some("yarn run develop"));
        assert_eq!(detected[0].env.get("GATSBY_LOGGER").map(String::as_str), Some("yurnalist"));
        assert_eq!(detected[0].plugins_recommended, vec!["@netlify/plugin-gatsby".to_string()]);
    }

    #[tokio::test]
    async fn test_detect_excludes_meta_frameworks() {
        let dir = project(r#"{ "dependencies": { "astro": "4", "vite": "5" } }"#);

        let ids: Vec<_> = BuiltinDetector
            .detect(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["astro".to_string()]);
    }

    #[tokio::test]
    async fn test_detect_multiple_frameworks() {
        let dir = project(r#"{ "dependencies": { "gatsby": "5", "@11ty/eleventy": "2" } }"#);

        let detected = BuiltinDetector.detect(dir.path()).await.unwrap();
        assert_eq!(detected.len(), 2);
    }

    #[tokio::test]
    async fn test_detect_from_config_file_without_package_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hugo.toml"), "title = 'site'").unwrap();

        let detected = BuiltinDetector.detect(dir.path()).await.unwrap();
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].dev_command.as_deref(), Some("hugo server -w"));
    }

    #[tokio::test]
    async fn test_detect_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

        assert!(BuiltinDetector.detect(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detect_invalid_package_json() {
        let dir = project("{ not json");
        assert!(BuiltinDetector.detect(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_get_framework() {
        let dir = TempDir::new().unwrap();

        let next = BuiltinDetector.get_framework("next", dir.path()).await.unwrap();
        assert_eq!(next.dev_command.as_deref(), Some("next"));

        let err = BuiltinDetector
            .get_framework("rails", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::UnsupportedFramework { ref id, .. } if id == "rails"));
    }
}
