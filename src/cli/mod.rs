//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Nodes | Node lifecycle | `add`, `move`, `set`, `remove` |
//! | Inspect | Reading hierarchies | `show`, `list --tree` |
//! | Integrity | Parent picking and audits | `parents`, `check` |
//!
//! Every node command takes a kind first: `category`, `collection`,
//! `media`, `metafield` or `option`.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! ctree --verbose parents category --for 4
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod node;
mod query;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
