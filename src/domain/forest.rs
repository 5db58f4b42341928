//! Forest view of a hierarchy snapshot
//!
//! Builds a petgraph `DiGraph` with parent -> child edges so whole-snapshot
//! questions (which nodes form loops, which parents are missing, which nodes
//! sit too deep) can be answered in one pass. Also produces the pre-order
//! walk used for tree output.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;

use super::hierarchy::Hierarchy;
use super::id::NodeId;
use super::node::Hierarchical;

/// Problems found in a snapshot
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    /// Parent loops, each listed child to parent from its smallest ID
    pub cycles: Vec<Vec<NodeId>>,

    /// `(node, missing_parent)` pairs
    pub dangling: Vec<(NodeId, NodeId)>,

    /// `(node, depth)` pairs deeper than the allowed maximum
    pub too_deep: Vec<(NodeId, usize)>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.dangling.is_empty() && self.too_deep.is_empty()
    }

    /// Total number of reported problems
    pub fn problem_count(&self) -> usize {
        self.cycles.len() + self.dangling.len() + self.too_deep.len()
    }
}

/// A parent -> child graph over one hierarchy
#[derive(Debug, Default)]
pub struct Forest {
    /// The underlying directed graph (edge direction: parent -> child)
    graph: DiGraph<NodeId, ()>,

    /// Map from NodeId to node index
    node_map: HashMap<NodeId, NodeIndex>,

    /// Parent references that point at nothing
    dangling: Vec<(NodeId, NodeId)>,

    /// Flat index for depth queries
    hierarchy: Hierarchy,
}

impl Forest {
    /// Builds the forest from a snapshot
    pub fn from_nodes<'a, T>(nodes: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: Hierarchical + 'a,
    {
        let nodes: Vec<&T> = nodes.into_iter().collect();
        let hierarchy = Hierarchy::new(nodes.iter().copied());

        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        // First pass: add all nodes
        for id in hierarchy.ids() {
            let idx = graph.add_node(id);
            node_map.insert(id, idx);
        }

        // Second pass: add all edges
        let mut dangling = Vec::new();
        for id in hierarchy.ids() {
            let Some(parent) = hierarchy.parent_of(id) else {
                continue;
            };
            match node_map.get(&parent) {
                Some(&parent_idx) => {
                    graph.add_edge(parent_idx, node_map[&id], ());
                }
                None => dangling.push((id, parent)),
            }
        }

        Self {
            graph,
            node_map,
            dangling,
            hierarchy,
        }
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Parent loops, including self-parents. Each loop starts at its
    /// smallest ID and follows parent links until it closes.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let mut cycles: Vec<Vec<NodeId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .filter_map(|component| {
                component
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).copied())
                    .min()
            })
            .map(|start| self.loop_from(start))
            .collect();
        cycles.sort();
        cycles
    }

    /// Follows parent links from `start` until they come back to it.
    /// Every node has at most one parent, so a loop is a single chain.
    fn loop_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut chain = vec![start];
        let mut current = self.hierarchy.parent_of(start);

        while let Some(id) = current {
            if id == start || chain.contains(&id) {
                break;
            }
            chain.push(id);
            current = self.hierarchy.parent_of(id);
        }

        chain
    }

    /// Runs every integrity check against `max_depth`
    pub fn audit(&self, max_depth: usize) -> AuditReport {
        let cycles = self.cycles();
        let in_cycle: std::collections::HashSet<NodeId> =
            cycles.iter().flatten().copied().collect();

        // Depths of nodes hanging off a loop are meaningless; report the loop instead
        let mut too_deep: Vec<(NodeId, usize)> = self
            .hierarchy
            .depths()
            .into_iter()
            .filter(|(id, depth)| {
                *depth > max_depth
                    && !in_cycle.contains(id)
                    && !self.hierarchy.ancestors(*id).iter().any(|a| in_cycle.contains(a))
            })
            .collect();
        too_deep.sort();

        AuditReport {
            cycles,
            dangling: self.dangling.clone(),
            too_deep,
        }
    }

    /// Pre-order walk from every root, yielding `(node, level)`.
    ///
    /// Roots and siblings are visited in the order given by `sort_key`.
    /// A node whose parent is missing starts its own subtree at level 1, so
    /// levels always equal [`Hierarchy::depths`]. Nodes caught in a loop are
    /// unreachable and left out.
    pub fn walk<K, F>(&self, mut sort_key: F) -> Vec<(NodeId, usize)>
    where
        K: Ord,
        F: FnMut(NodeId) -> K,
    {
        let mut starts: Vec<(NodeId, usize)> =
            self.hierarchy.roots().into_iter().map(|id| (id, 0)).collect();
        starts.extend(self.dangling.iter().map(|(id, _)| (*id, 1)));
        starts.sort_by_key(|(id, _)| sort_key(*id));

        let mut result = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, usize)> = starts.into_iter().rev().collect();

        while let Some((id, level)) = stack.pop() {
            result.push((id, level));

            let Some(&idx) = self.node_map.get(&id) else {
                continue;
            };
            let mut children: Vec<NodeId> = self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .filter_map(|child| self.graph.node_weight(child).copied())
                .collect();
            children.sort_by_key(|child| sort_key(*child));

            for child in children.into_iter().rev() {
                stack.push((child, level + 1));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NodeId {
        NodeId::new(n).unwrap()
    }

    fn forest(pairs: &[(u64, Option<u64>)]) -> Forest {
        let nodes: Vec<(NodeId, Option<NodeId>)> = pairs
            .iter()
            .map(|&(n, p)| (id(n), p.map(id)))
            .collect();
        Forest::from_nodes(&nodes)
    }

    #[test]
    fn empty_forest() {
        let f = forest(&[]);
        assert!(f.is_empty());
        assert!(f.audit(2).is_clean());
        assert!(f.walk(|id| id).is_empty());
    }

    #[test]
    fn clean_forest_audit() {
        let f = forest(&[(1, None), (2, Some(1)), (3, Some(2)), (4, None)]);
        let report = f.audit(2);

        assert!(report.is_clean());
        assert_eq!(report.problem_count(), 0);
    }

    #[test]
    fn detects_cycles() {
        let f = forest(&[(1, Some(2)), (2, Some(1)), (3, None), (4, Some(4))]);
        let report = f.audit(2);

        assert_eq!(report.cycles, vec![vec![id(1), id(2)], vec![id(4)]]);
        assert!(!report.is_clean());
    }

    #[test]
    fn cycles_follow_parent_links() {
        // 1's parent is 3, 3's parent is 2, 2's parent is 1
        let f = forest(&[(1, Some(3)), (2, Some(1)), (3, Some(2)), (4, Some(1))]);

        assert_eq!(f.cycles(), vec![vec![id(1), id(3), id(2)]]);
    }

    #[test]
    fn detects_dangling_parents() {
        let f = forest(&[(1, None), (2, Some(9))]);
        let report = f.audit(2);

        assert_eq!(report.dangling, vec![(id(2), id(9))]);
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn detects_too_deep() {
        let f = forest(&[(1, None), (2, Some(1)), (3, Some(2)), (4, Some(3))]);

        assert_eq!(f.audit(2).too_deep, vec![(id(4), 3)]);
        assert!(f.audit(3).is_clean());
    }

    #[test]
    fn loop_descendants_are_not_reported_as_too_deep() {
        let f = forest(&[(1, Some(2)), (2, Some(1)), (3, Some(1)), (4, Some(3))]);
        let report = f.audit(1);

        assert_eq!(report.cycles.len(), 1);
        assert!(report.too_deep.is_empty());
    }

    #[test]
    fn walk_is_preorder() {
        let f = forest(&[(1, None), (2, Some(1)), (3, Some(2)), (4, Some(1)), (5, None)]);
        let walk = f.walk(|id| id);

        assert_eq!(
            walk,
            vec![
                (id(1), 0),
                (id(2), 1),
                (id(3), 2),
                (id(4), 1),
                (id(5), 0),
            ]
        );
    }

    #[test]
    fn walk_honours_sort_key() {
        let f = forest(&[(1, None), (2, Some(1)), (3, Some(1))]);
        // reverse ID order
        let walk = f.walk(|id| std::cmp::Reverse(id));

        assert_eq!(walk, vec![(id(1), 0), (id(3), 1), (id(2), 1)]);
    }

    #[test]
    fn walk_skips_loops_and_keeps_orphans() {
        let f = forest(&[(1, Some(2)), (2, Some(1)), (3, Some(99)), (4, Some(3))]);
        let walk = f.walk(|id| id);

        assert_eq!(walk, vec![(id(3), 1), (id(4), 2)]);
    }

    #[test]
    fn walk_levels_match_depths() {
        let f = forest(&[(1, None), (2, Some(1)), (5, Some(42)), (6, Some(5))]);
        let depths = f.hierarchy().depths();

        let walk = f.walk(|id| id);
        assert_eq!(walk.len(), 4);
        for (id, level) in walk {
            assert_eq!(level, depths[&id], "level of {}", id);
        }
    }
}
