//! catalog-tree - parent/child integrity for commerce catalog hierarchies
//!
//! Categories, collections, media, metafields and options are each a
//! self-referencing hierarchy. This crate keeps them as forests: no node is
//! its own ancestor and nesting never goes deeper than the configured limit.
//! The checks live in [`domain::Hierarchy`] and work over any record type
//! implementing [`domain::Hierarchical`].

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{CyclePolicy, Hierarchical, Hierarchy, HierarchyError, Node, NodeId, NodeKind};
