//! Parent/child integrity checks for catalog hierarchies
//!
//! [`Hierarchy`] is a read-only index over a snapshot of nodes. It answers
//! the questions a "choose a parent" picker needs:
//!
//! - how deep is a node ([`Hierarchy::depth_of`])
//! - would a node at this depth still accept children
//!   ([`Hierarchy::would_exceed_max_depth`])
//! - would picking this parent close a loop ([`Hierarchy::would_create_cycle`])
//!
//! Those three never fail. Corrupt data (a parent chain that loops, a parent
//! that no longer exists) degrades to "treat as root". Write paths use
//! [`Hierarchy::validate_parent`] instead, which reports a [`HierarchyError`].
//!
//! Build a new `Hierarchy` whenever the node set changes; nothing is cached
//! between snapshots.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

use super::id::NodeId;
use super::node::Hierarchical;

/// Deepest level that may hold nodes: root = 0, child = 1, grandchild = 2
pub const DEFAULT_MAX_DEPTH: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum HierarchyError {
    #[error("Node cannot be its own parent: {0}")]
    SelfParent(NodeId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Making {parent} the parent of {node} would create a cycle")]
    WouldCreateCycle { node: NodeId, parent: NodeId },

    #[error("Existing parent chain loops back to {0}")]
    CycleDetected(NodeId),

    #[error("{parent} is at depth {depth}; placing the node under it would exceed the maximum depth of {max_depth}")]
    MaxDepthExceeded {
        parent: NodeId,
        depth: usize,
        max_depth: usize,
    },
}

/// What to do when a depth walk runs into a pre-existing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Log a warning and treat the loop point as a root
    Warn,
    /// Fail with [`HierarchyError::CycleDetected`]
    #[default]
    Reject,
}

/// Outcome of walking up a parent chain
struct Walk {
    depth: usize,
    cycle_at: Option<NodeId>,
}

/// Outcome of walking the ancestors of a prospective parent
enum AncestorWalk {
    ReachesSelf,
    Cycle(NodeId),
    Clear,
}

/// Index over a snapshot of hierarchical records
#[derive(Debug, Default, Clone)]
pub struct Hierarchy {
    parents: HashMap<NodeId, Option<NodeId>>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl Hierarchy {
    /// Indexes a snapshot. Later duplicates of an ID replace earlier ones.
    pub fn new<'a, T>(nodes: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: Hierarchical + 'a,
    {
        let parents: HashMap<NodeId, Option<NodeId>> = nodes
            .into_iter()
            .map(|node| (node.node_id(), node.parent_id()))
            .collect();

        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (&id, parent) in &parents {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(id);
            }
        }
        for list in children.values_mut() {
            list.sort();
        }

        Self { parents, children }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.parents.contains_key(&id)
    }

    /// All node IDs, ascending
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.parents.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Recorded parent of a node (`None` for roots and unknown IDs)
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied().flatten()
    }

    /// Direct children of a node, ascending by ID
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes without a parent, ascending by ID
    pub fn roots(&self) -> Vec<NodeId> {
        self.ids()
            .into_iter()
            .filter(|id| self.parent_of(*id).is_none())
            .collect()
    }

    /// Number of parent hops from a node to its root.
    ///
    /// `None`, roots and unknown IDs are at depth 0. A parent reference to a
    /// missing node counts as one hop to a root. If the chain loops, the
    /// revisited node is treated as a root and a warning is logged.
    pub fn depth_of(&self, node_id: Option<NodeId>) -> usize {
        let Some(start) = node_id else {
            return 0;
        };

        let walk = self.walk_up(start, &mut HashMap::new());
        if let Some(at) = walk.cycle_at {
            warn!(node = %start, revisited = %at, "parent chain loops; treating loop point as root");
        }
        walk.depth
    }

    /// Like [`depth_of`](Self::depth_of), but a looping chain is an error
    pub fn try_depth_of(&self, node_id: Option<NodeId>) -> Result<usize, HierarchyError> {
        let Some(start) = node_id else {
            return Ok(0);
        };

        let walk = self.walk_up(start, &mut HashMap::new());
        match walk.cycle_at {
            Some(at) => Err(HierarchyError::CycleDetected(at)),
            None => Ok(walk.depth),
        }
    }

    /// Depth lookup following the configured cycle policy
    pub fn resolve_depth(
        &self,
        node_id: Option<NodeId>,
        policy: CyclePolicy,
    ) -> Result<usize, HierarchyError> {
        match policy {
            CyclePolicy::Warn => Ok(self.depth_of(node_id)),
            CyclePolicy::Reject => self.try_depth_of(node_id),
        }
    }

    /// Depth of every node, sharing one memo across the whole pass
    pub fn depths(&self) -> HashMap<NodeId, usize> {
        let mut memo = HashMap::new();
        let mut result = HashMap::with_capacity(self.parents.len());

        for id in self.ids() {
            let walk = self.walk_up(id, &mut memo);
            if let Some(at) = walk.cycle_at {
                warn!(node = %id, revisited = %at, "parent chain loops; treating loop point as root");
            }
            result.insert(id, walk.depth);
        }

        result
    }

    /// True if `node_id` cannot take another child under `max_depth`, or if
    /// it is the node being edited (`self_id`).
    pub fn would_exceed_max_depth(
        &self,
        node_id: NodeId,
        max_depth: usize,
        self_id: Option<NodeId>,
    ) -> bool {
        if self_id == Some(node_id) {
            return true;
        }
        self.depth_of(Some(node_id)) + 1 > max_depth
    }

    /// True if making `prospective_parent` the parent of `self_id` would put
    /// `self_id` among its own ancestors. An existing loop in the
    /// prospective parent's chain also counts. A node that does not exist
    /// yet (`self_id == None`) can never close a cycle.
    pub fn would_create_cycle(
        &self,
        prospective_parent: Option<NodeId>,
        self_id: Option<NodeId>,
    ) -> bool {
        let (Some(parent), Some(me)) = (prospective_parent, self_id) else {
            return false;
        };

        !matches!(self.walk_ancestors(parent, Some(me)), AncestorWalk::Clear)
    }

    /// Height of the subtree below a node (0 for a leaf)
    pub fn subtree_height(&self, id: NodeId) -> usize {
        let mut visited = HashSet::from([id]);
        let mut stack = vec![(id, 0usize)];
        let mut height = 0;

        while let Some((current, level)) = stack.pop() {
            height = height.max(level);
            for &child in self.children(current) {
                if visited.insert(child) {
                    stack.push((child, level + 1));
                }
            }
        }

        height
    }

    /// Ancestors of a node, nearest first. Stops at a root, a missing
    /// parent, or the first repeated ID.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([id]);
        let mut result = Vec::new();
        let mut current = self.parent_of(id);

        while let Some(ancestor) = current {
            if !self.contains(ancestor) || !seen.insert(ancestor) {
                break;
            }
            result.push(ancestor);
            current = self.parent_of(ancestor);
        }

        result
    }

    /// Checks a parent assignment before it is written.
    ///
    /// `self_id` is `None` when the node is being created. Moving an existing
    /// node also accounts for the height of its subtree, so descendants
    /// cannot be pushed past `max_depth`.
    pub fn validate_parent(
        &self,
        self_id: Option<NodeId>,
        parent: Option<NodeId>,
        max_depth: usize,
        policy: CyclePolicy,
    ) -> Result<(), HierarchyError> {
        let Some(parent) = parent else {
            return Ok(());
        };

        if self_id == Some(parent) {
            return Err(HierarchyError::SelfParent(parent));
        }

        if !self.contains(parent) {
            return Err(HierarchyError::NodeNotFound(parent));
        }

        match self.walk_ancestors(parent, self_id) {
            AncestorWalk::ReachesSelf => {
                return Err(HierarchyError::WouldCreateCycle {
                    node: self_id.unwrap_or(parent),
                    parent,
                });
            }
            AncestorWalk::Cycle(at) => match (policy, self_id) {
                (CyclePolicy::Reject, _) => return Err(HierarchyError::CycleDetected(at)),
                (CyclePolicy::Warn, Some(node)) => {
                    return Err(HierarchyError::WouldCreateCycle { node, parent });
                }
                (CyclePolicy::Warn, None) => {}
            },
            AncestorWalk::Clear => {}
        }

        let depth = self.resolve_depth(Some(parent), policy)?;
        let below = self_id.map(|id| self.subtree_height(id)).unwrap_or(0);

        if depth + 1 + below > max_depth {
            return Err(HierarchyError::MaxDepthExceeded {
                parent,
                depth,
                max_depth,
            });
        }

        Ok(())
    }

    /// Every node that `validate_parent` would accept for `self_id`,
    /// ascending by ID
    pub fn parent_candidates(
        &self,
        self_id: Option<NodeId>,
        max_depth: usize,
        policy: CyclePolicy,
    ) -> Vec<NodeId> {
        self.ids()
            .into_iter()
            .filter(|&candidate| {
                self.validate_parent(self_id, Some(candidate), max_depth, policy)
                    .is_ok()
            })
            .collect()
    }

    /// Walks up from `start`, using and filling `memo` for chains that end
    /// at a root or a missing node. Chains that loop are never memoized,
    /// since their depth depends on where the walk began.
    fn walk_up(&self, start: NodeId, memo: &mut HashMap<NodeId, usize>) -> Walk {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start;

        let (base, cycle_at) = loop {
            if let Some(&known) = memo.get(&current) {
                break (known, None);
            }
            if !visited.insert(current) {
                break (0, Some(current));
            }
            match self.parents.get(&current) {
                // Missing node: the walk stops here as if at a root
                None => break (0, None),
                Some(None) => {
                    memo.insert(current, 0);
                    break (0, None);
                }
                Some(Some(parent)) => {
                    path.push(current);
                    current = *parent;
                }
            }
        };

        if cycle_at.is_none() {
            let len = path.len();
            for (i, id) in path.iter().enumerate() {
                memo.insert(*id, base + (len - i));
            }
        }

        Walk {
            depth: base + path.len(),
            cycle_at,
        }
    }

    fn walk_ancestors(&self, parent: NodeId, self_id: Option<NodeId>) -> AncestorWalk {
        let mut visited = HashSet::new();
        let mut current = Some(parent);

        while let Some(id) = current {
            if Some(id) == self_id {
                return AncestorWalk::ReachesSelf;
            }
            if !visited.insert(id) {
                return AncestorWalk::Cycle(id);
            }
            current = self.parent_of(id);
        }

        AncestorWalk::Clear
    }
}
