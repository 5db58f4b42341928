//! Configuration handling for catalog-tree
//!
//! Configuration is stored in `.catalog/config.toml` (project) and
//! `~/.config/catalog-tree/config.toml` (global). Set `CTREE_CONFIG_DIR`
//! to read the global file from somewhere else.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{CyclePolicy, NodeKind, DEFAULT_MAX_DEPTH};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Upper bound accepted for `max_depth`
const MAX_DEPTH_LIMIT: usize = 32;

/// Per-kind overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct KindConfig {
    /// Deepest allowed level for this kind (0 = roots only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Deepest allowed level (root = 0); 2 gives root, child, grandchild
    pub max_depth: usize,

    /// How parent checks treat loops already present in the data
    pub cycle_policy: CyclePolicy,

    /// Overrides per kind. Keys accept any spelling `NodeKind` parses
    /// (`[kinds.media]`, `[kinds.Options]`).
    #[serde(deserialize_with = "deserialize_kinds")]
    pub kinds: BTreeMap<NodeKind, KindConfig>,
}

fn deserialize_kinds<'de, D>(deserializer: D) -> Result<BTreeMap<NodeKind, KindConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, KindConfig>::deserialize(deserializer)?;
    let mut kinds = BTreeMap::new();

    for (key, overrides) in raw {
        let kind: NodeKind = key.parse().map_err(de::Error::custom)?;
        if kinds.insert(kind, overrides).is_some() {
            return Err(de::Error::custom(format!(
                "kinds.{} is configured more than once",
                kind
            )));
        }
    }

    Ok(kinds)
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            cycle_policy: CyclePolicy::default(),
            kinds: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Effective maximum depth for a kind
    pub fn max_depth_for(&self, kind: NodeKind) -> usize {
        self.kinds
            .get(&kind)
            .and_then(|k| k.max_depth)
            .unwrap_or(self.max_depth)
    }

    /// Rejects values the hierarchy logic cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_depth {} exceeds the limit of {}",
                self.max_depth, MAX_DEPTH_LIMIT
            )));
        }
        for (kind, overrides) in &self.kinds {
            if let Some(depth) = overrides.max_depth {
                if depth > MAX_DEPTH_LIMIT {
                    return Err(ConfigError::Invalid(format!(
                        "kinds.{}.max_depth {} exceeds the limit of {}",
                        kind, depth, MAX_DEPTH_LIMIT
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Output format for commands
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Configuration in effect for one project
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
}

impl Config {
    /// Loads and validates `.catalog/config.toml` under `project_root`
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let project = Self::load_project_config(project_root)?;
        debug!(
            root = %project_root.display(),
            max_depth = project.max_depth,
            cycle_policy = ?project.cycle_policy,
            "loaded project config"
        );
        Ok(Self { project })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("CTREE_CONFIG_DIR") {
            return Some(PathBuf::from(dir));
        }
        ProjectDirs::from("dev", "catalog-tree", "catalog-tree")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".catalog").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for a `.catalog/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".catalog").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = ProjectConfig::default();

        assert_eq!(config.max_depth, 2);
        assert_eq!(config.cycle_policy, CyclePolicy::Reject);
        assert!(config.kinds.is_empty());
        assert_eq!(GlobalConfig::default().default_format, OutputFormat::Text);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
max_depth = 3
cycle_policy = "warn"

[kinds.media]
max_depth = 1
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.cycle_policy, CyclePolicy::Warn);
        assert_eq!(config.max_depth_for(NodeKind::Media), 1);
        assert_eq!(config.max_depth_for(NodeKind::Category), 3);
    }

    #[test]
    fn parse_partial_project_config() {
        let config: ProjectConfig = toml::from_str("[kinds.option]\n").unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_depth_for(NodeKind::ProductOption), 2);
    }

    #[test]
    fn reject_unknown_kind() {
        let err = toml::from_str::<ProjectConfig>("[kinds.brand]\nmax_depth = 1\n").unwrap_err();
        assert!(err.to_string().contains("Unknown node kind 'brand'"));
    }

    #[test]
    fn kind_keys_accept_plural_and_mixed_case() {
        let toml = "[kinds.options]\nmax_depth = 0\n\n[kinds.Media]\nmax_depth = 1\n";

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_depth_for(NodeKind::ProductOption), 0);
        assert_eq!(config.max_depth_for(NodeKind::Media), 1);
        assert_eq!(config.max_depth_for(NodeKind::Category), 2);
    }

    #[test]
    fn reject_kind_configured_twice() {
        let toml = "[kinds.media]\nmax_depth = 0\n\n[kinds.Media]\nmax_depth = 1\n";

        let err = toml::from_str::<ProjectConfig>(toml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn validate_limits() {
        let mut config = ProjectConfig::default();
        assert!(config.validate().is_ok());

        config.max_depth = 1000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_depth = 2;
        config.kinds.insert(
            NodeKind::Collection,
            KindConfig {
                max_depth: Some(99),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("default_format = \"json\"\n").unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn project_config_loads_from_file() {
        let dir = TempDir::new().unwrap();
        let catalog_dir = dir.path().join(".catalog");
        fs::create_dir_all(&catalog_dir).unwrap();
        fs::write(
            catalog_dir.join("config.toml"),
            "max_depth = 4\n\n[kinds.metafield]\nmax_depth = 1\n",
        )
        .unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert_eq!(config.project.max_depth_for(NodeKind::Category), 4);
        assert_eq!(config.project.max_depth_for(NodeKind::Metafield), 1);
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".catalog")).unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert_eq!(config.project, ProjectConfig::default());
    }

    #[test]
    fn invalid_project_config_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let catalog_dir = dir.path().join(".catalog");
        fs::create_dir_all(&catalog_dir).unwrap();
        fs::write(catalog_dir.join("config.toml"), "max_depth = 500\n").unwrap();

        let err = Config::for_project(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds the limit of 32"));
    }
}
