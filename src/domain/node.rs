//! Node domain model
//!
//! A node is one record of a self-referencing catalog hierarchy. Only
//! `id` and `parent_id` matter to the hierarchy logic; the rest is payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::id::{NodeId, NodeKind};

/// Anything that lives in a parent/child hierarchy keyed by [`NodeId`]
pub trait Hierarchical {
    fn node_id(&self) -> NodeId;
    fn parent_id(&self) -> Option<NodeId>;
}

impl Hierarchical for (NodeId, Option<NodeId>) {
    fn node_id(&self) -> NodeId {
        self.0
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.1
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("Field '{field}' is not valid for {kind} nodes (allowed: {allowed})")]
    NotAllowed {
        kind: NodeKind,
        field: String,
        allowed: String,
    },

    #[error("Field assignment must look like key=value, got '{0}'")]
    Malformed(String),
}

/// A catalog node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    /// Parent node of the same kind, `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Display label
    pub name: String,

    /// Sort key among siblings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    /// Kind-specific payload (image, url, value, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Creates a root node
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent_id: None,
            name: name.into(),
            order: None,
            fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style parent assignment, used when creating nodes
    pub fn with_parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent_id = parent;
        self
    }

    pub fn with_order(mut self, order: Option<i64>) -> Self {
        self.order = order;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Moves the node under a new parent (or to the root level)
    pub fn reparent(&mut self, parent: Option<NodeId>) {
        self.parent_id = parent;
        self.touch();
    }

    /// Sets a payload field after checking it against the kind's schema
    pub fn set_field(
        &mut self,
        kind: NodeKind,
        key: &str,
        value: impl Into<String>,
    ) -> Result<(), FieldError> {
        check_field(kind, key)?;
        self.fields.insert(key.to_string(), value.into());
        self.touch();
        Ok(())
    }

    /// Sort key used for sibling ordering in tree output
    pub fn sort_key(&self) -> (i64, String, NodeId) {
        (
            self.order.unwrap_or(i64::MAX),
            self.name.to_lowercase(),
            self.id,
        )
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Hierarchical for Node {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }
}

fn check_field(kind: NodeKind, key: &str) -> Result<(), FieldError> {
    if kind.allowed_fields().contains(&key) {
        Ok(())
    } else {
        Err(FieldError::NotAllowed {
            kind,
            field: key.to_string(),
            allowed: kind.allowed_fields().join(", "),
        })
    }
}

/// Parses a `key=value` assignment from the command line
pub fn parse_field_assignment(raw: &str) -> Result<(String, String), FieldError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(FieldError::Malformed(raw.to_string())),
    }
}
