//! # Storage Layer
//!
//! Persistence layer for catalog-tree with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Nodes | JSONL (one JSON per line) | `.catalog/{kind}.jsonl` |
//! | Config | TOML | `.catalog/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`NodeStore`] uses file locking (`fs2`) for concurrent access
//! - Commands that change a kind hold its [`StoreLock`] (`{kind}.lock`)
//!   across read, validation and write, so IDs stay unique
//! - Full rewrites are atomic (temp file + rename)
//!
//! ## Project Structure
//!
//! ```text
//! .catalog/
//! ├── category.jsonl
//! ├── collection.jsonl
//! ├── media.jsonl
//! ├── metafield.jsonl
//! ├── option.jsonl
//! ├── config.toml
//! └── .gitignore
//! ```

mod jsonl;
mod config;
mod project;

pub use jsonl::{NodeStore, StoreLock};
pub use config::{Config, ConfigError, GlobalConfig, KindConfig, OutputFormat, ProjectConfig};
pub use project::{Project, ProjectError};
