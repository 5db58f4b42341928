//! Domain models for catalog-tree
//!
//! Contains the core hierarchy logic without any I/O concerns.

mod id;
mod node;
mod hierarchy;
mod forest;

pub use id::{IdError, NodeId, NodeKind};
pub use node::{parse_field_assignment, FieldError, Hierarchical, Node};
pub use hierarchy::{CyclePolicy, Hierarchy, HierarchyError, DEFAULT_MAX_DEPTH};
pub use forest::{AuditReport, Forest};
