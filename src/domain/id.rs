//! Node identifiers and hierarchy kinds
//!
//! ID Format:
//! - Node IDs are positive integers assigned by the store (`1`, `2`, ...)
//! - They may be written with a leading `#` on the command line (`#12`)
//!
//! Each [`NodeKind`] is a separate hierarchy: a category can only have a
//! category as its parent, a media item only a media item, and so on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid node ID: expected a positive integer, got '{0}'")]
    InvalidNodeId(String),

    #[error("No node ID left after {0}")]
    Exhausted(NodeId),

    #[error("Unknown node kind '{0}' (expected one of: category, collection, media, metafield, option)")]
    UnknownKind(String),
}

/// Identifier of a node within one hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a node ID, rejecting zero
    pub fn new(value: u64) -> Result<Self, IdError> {
        if value == 0 {
            return Err(IdError::InvalidNodeId(value.to_string()));
        }
        Ok(Self(value))
    }

    /// The first ID handed out in an empty store
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the ID that follows this one
    pub fn next(self) -> Result<Self, IdError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(IdError::Exhausted(self))
    }

    /// Returns the raw integer value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

        let value: u64 = digits
            .parse()
            .map_err(|_| IdError::InvalidNodeId(s.to_string()))?;

        Self::new(value).map_err(|_| IdError::InvalidNodeId(s.to_string()))
    }
}

impl TryFrom<u64> for NodeId {
    type Error = IdError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// The self-referencing entity types of the catalog
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[value(alias = "categories")]
    Category,
    #[value(alias = "collections")]
    Collection,
    Media,
    #[value(alias = "metafields")]
    Metafield,
    #[serde(rename = "option")]
    #[value(name = "option", alias = "options")]
    ProductOption,
}

impl NodeKind {
    /// All kinds, in display order
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Category,
        NodeKind::Collection,
        NodeKind::Media,
        NodeKind::Metafield,
        NodeKind::ProductOption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Category => "category",
            NodeKind::Collection => "collection",
            NodeKind::Media => "media",
            NodeKind::Metafield => "metafield",
            NodeKind::ProductOption => "option",
        }
    }

    /// Name of the JSONL file holding this kind's nodes
    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }

    /// Payload fields a node of this kind may carry besides its name
    pub fn allowed_fields(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Category | NodeKind::Collection => &["image", "notes"],
            NodeKind::Media => &["url", "type", "notes"],
            NodeKind::Metafield => &["type", "value"],
            NodeKind::ProductOption => &["value"],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "categories" => Ok(NodeKind::Category),
            "collection" | "collections" => Ok(NodeKind::Collection),
            "media" => Ok(NodeKind::Media),
            "metafield" | "metafields" => Ok(NodeKind::Metafield),
            "option" | "options" => Ok(NodeKind::ProductOption),
            other => Err(IdError::UnknownKind(other.to_string())),
        }
    }
}
