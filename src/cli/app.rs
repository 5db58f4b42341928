//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{node, query};
use crate::domain::NodeKind;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "ctree")]
#[command(author, version, about = "Keep catalog hierarchies free of loops and too-deep nesting")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new catalog project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Create a node
    ///
    /// Examples:
    ///   ctree add category "Apparel"
    ///   ctree add category "Shoes" --parent 1
    ///   ctree add media "Hero" --field url=https://cdn.example/hero.png
    Add {
        /// Hierarchy the node belongs to
        kind: NodeKind,

        /// Display name
        name: String,

        /// Parent node ID (omit for a root node)
        #[arg(long, short)]
        parent: Option<String>,

        /// Sort position among siblings
        #[arg(long)]
        order: Option<i64>,

        /// Payload field as key=value (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Change a node's parent
    Move {
        kind: NodeKind,

        /// Node to move
        id: String,

        /// New parent node ID
        #[arg(long, short, conflicts_with = "root", required_unless_present = "root")]
        parent: Option<String>,

        /// Make the node a root
        #[arg(long)]
        root: bool,
    },

    /// Set a node's name, order, or a payload field
    Set {
        kind: NodeKind,

        id: String,

        /// `name`, `order`, or a field allowed for the kind
        key: String,

        value: String,
    },

    /// Show node details
    Show {
        kind: NodeKind,

        id: String,
    },

    /// List nodes of a kind
    List {
        kind: NodeKind,

        /// Indented tree instead of a flat table
        #[arg(long, short)]
        tree: bool,
    },

    /// List nodes that may be picked as a parent
    Parents {
        kind: NodeKind,

        /// Node being edited (omit when creating a new node)
        #[arg(long = "for", value_name = "ID")]
        for_id: Option<String>,
    },

    /// Audit hierarchies for loops, missing parents and depth violations
    Check {
        /// Only check this kind
        kind: Option<NodeKind>,
    },

    /// Delete a node without children
    Remove {
        kind: NodeKind,

        id: String,
    },
}

/// Installs the stderr tracing subscriber; `CTREE_LOG` overrides the level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("CTREE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format,
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("ctree starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .catalog directory at: {}", project.catalog_dir().display()),
            );
            output.success(&format!(
                "Initialized catalog project at {}",
                project.root().display()
            ));
        }

        Commands::Add {
            kind,
            name,
            parent,
            order,
            fields,
        } => node::add(&output, kind, &name, parent.as_deref(), order, &fields)?,

        Commands::Move {
            kind,
            id,
            parent,
            root,
        } => {
            // clap guarantees exactly one of --parent / --root
            let parent = if root { None } else { parent };
            node::reparent(&output, kind, &id, parent.as_deref())?
        }

        Commands::Set {
            kind,
            id,
            key,
            value,
        } => node::set_field(&output, kind, &id, &key, &value)?,

        Commands::Show { kind, id } => node::show(&output, kind, &id)?,

        Commands::List { kind, tree } => node::list(&output, kind, tree)?,

        Commands::Parents { kind, for_id } => {
            output.verbose_ctx("parents", &format!("Candidates for: {:?}", for_id));
            query::parents(&output, kind, for_id.as_deref())?
        }

        Commands::Check { kind } => query::check(&output, kind)?,

        Commands::Remove { kind, id } => node::remove(&output, kind, &id)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
