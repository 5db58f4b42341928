//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, NodeStore};
use crate::domain::{CyclePolicy, NodeKind};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a catalog project. Run 'ctree init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# catalog-tree configuration

# Deepest level that may hold nodes (root = 0).
# 2 allows root -> child -> grandchild.
max_depth = 2

# What parent checks do when the data already contains a loop:
#   "reject" - refuse the change and name the loop
#   "warn"   - log a warning and treat the loop point as a root
cycle_policy = "reject"

# Per-kind overrides, e.g.
# [kinds.media]
# max_depth = 1
"#;

const GITIGNORE: &str = r#"# Ignore interrupted writes and writer locks
*.jsonl.tmp
*.lock
"#;

/// A catalog project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let catalog_dir = root.join(".catalog");

        if !catalog_dir.is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let catalog_dir = root.join(".catalog");

        fs::create_dir_all(&catalog_dir).with_context(|| {
            format!(
                "Failed to create .catalog directory: {}",
                catalog_dir.display()
            )
        })?;

        let config_path = catalog_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = catalog_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .catalog directory path
    pub fn catalog_dir(&self) -> PathBuf {
        self.root.join(".catalog")
    }

    /// Returns the node store for a kind
    pub fn node_store(&self, kind: NodeKind) -> NodeStore {
        NodeStore::for_project(&self.root, kind)
    }

    /// Effective maximum depth for a kind
    pub fn max_depth(&self, kind: NodeKind) -> usize {
        self.config.project.max_depth_for(kind)
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        self.config.project.cycle_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(project.catalog_dir().is_dir());
        assert!(project.catalog_dir().join("config.toml").is_file());
        assert!(project.catalog_dir().join(".gitignore").is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Project::init(dir.path()).unwrap();
        Project::init(dir.path()).unwrap(); // Should not fail

        assert!(dir.path().join(".catalog").is_dir());
    }

    #[test]
    fn init_keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        let catalog_dir = dir.path().join(".catalog");
        fs::create_dir_all(&catalog_dir).unwrap();
        fs::write(catalog_dir.join("config.toml"), "max_depth = 4\n").unwrap();

        let project = Project::init(dir.path()).unwrap();
        assert_eq!(project.max_depth(NodeKind::Category), 4);
    }

    #[test]
    fn default_config_is_loadable() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert_eq!(project.max_depth(NodeKind::Media), 2);
        assert_eq!(project.cycle_policy(), CyclePolicy::Reject);
    }

    #[test]
    fn open_existing_project() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();

        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.root(), dir.path());
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        let result = Project::open(dir.path());

        assert!(result.is_err());
    }

    #[test]
    fn stores_are_per_kind() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        let categories = project.node_store(NodeKind::Category);
        let options = project.node_store(NodeKind::ProductOption);

        assert!(categories.path().ends_with("category.jsonl"));
        assert!(options.path().ends_with("option.jsonl"));
        assert_eq!(options.kind(), NodeKind::ProductOption);
    }
}
