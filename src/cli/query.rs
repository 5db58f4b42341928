//! Query commands (parents, check)

use anyhow::Result;

use super::output::Output;
use crate::domain::{AuditReport, Forest, Hierarchy, NodeId, NodeKind};
use crate::storage::Project;

/// Show nodes that may be picked as the parent of a new or existing node
pub fn parents(output: &Output, kind: NodeKind, for_id: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let nodes = project.node_store(kind).read_all()?;

    let self_id: Option<NodeId> = for_id.map(str::parse).transpose()?;
    if let Some(id) = self_id {
        if !nodes.contains_key(&id) {
            anyhow::bail!("{} not found: {}", kind, id);
        }
    }

    let max_depth = project.max_depth(kind);
    let hierarchy = Hierarchy::new(nodes.values());
    let candidates = hierarchy.parent_candidates(self_id, max_depth, project.cycle_policy());
    let depths = hierarchy.depths();

    output.verbose_ctx(
        "parents",
        &format!(
            "{} of {} {} nodes are valid parents (max depth {})",
            candidates.len(),
            nodes.len(),
            kind,
            max_depth
        ),
    );

    if output.is_json() {
        let items: Vec<_> = candidates
            .iter()
            .filter_map(|id| nodes.get(id))
            .map(|n| {
                serde_json::json!({
                    "id": n.id,
                    "name": n.name,
                    "depth": depths.get(&n.id).copied().unwrap_or(0),
                })
            })
            .collect();
        output.data(&items);
    } else if candidates.is_empty() {
        println!("No valid parents; the node can only be placed at the root level.");
    } else {
        println!("Valid parents ({}):", candidates.len());
        println!("{:<8} {:<6} NAME", "ID", "DEPTH");
        println!("{}", "-".repeat(50));
        for id in &candidates {
            if let Some(node) = nodes.get(id) {
                let depth = depths.get(id).copied().unwrap_or(0);
                println!("{:<8} {:<6} {}", node.id, depth, node.name);
            }
        }
    }

    Ok(())
}

/// Audit one kind, or every kind, for loops, missing parents and depth violations
pub fn check(output: &Output, kind: Option<NodeKind>) -> Result<()> {
    let project = Project::open_current()?;
    let kinds: Vec<NodeKind> = match kind {
        Some(kind) => vec![kind],
        None => NodeKind::ALL.to_vec(),
    };

    let mut reports: Vec<(NodeKind, usize, AuditReport)> = Vec::new();
    for kind in kinds {
        let nodes = project.node_store(kind).read_all()?;
        let max_depth = project.max_depth(kind);
        output.verbose_ctx(
            "check",
            &format!("Auditing {} {} nodes (max depth {})", nodes.len(), kind, max_depth),
        );

        let report = Forest::from_nodes(nodes.values()).audit(max_depth);
        reports.push((kind, nodes.len(), report));
    }

    let problems: usize = reports.iter().map(|(_, _, r)| r.problem_count()).sum();

    if output.is_json() {
        let items: Vec<_> = reports
            .iter()
            .map(|(kind, count, report)| {
                serde_json::json!({
                    "kind": kind,
                    "nodes": count,
                    "clean": report.is_clean(),
                    "cycles": report.cycles,
                    "dangling": report.dangling,
                    "too_deep": report.too_deep,
                })
            })
            .collect();
        output.data(&items);
    } else {
        for (kind, count, report) in &reports {
            if report.is_clean() {
                println!("{:<12} ok ({} nodes)", kind.as_str(), count);
                continue;
            }

            println!(
                "{:<12} {} problem(s) ({} nodes)",
                kind.as_str(),
                report.problem_count(),
                count
            );
            // each arrow points from a node to its parent; the last one closes the loop
            for cycle in &report.cycles {
                let ids: Vec<String> = cycle
                    .iter()
                    .chain(cycle.first())
                    .map(|id| id.to_string())
                    .collect();
                println!("  loop: {}", ids.join(" -> "));
            }
            for (node, parent) in &report.dangling {
                println!("  missing parent: {} points at {}", node, parent);
            }
            for (node, depth) in &report.too_deep {
                println!("  too deep: {} at depth {}", node, depth);
            }
        }
    }

    if problems > 0 {
        anyhow::bail!("Found {} hierarchy problem(s)", problems);
    }

    Ok(())
}
