//! Node CLI commands (add, move, set, show, list, remove)

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::output::Output;
use crate::domain::{parse_field_assignment, Forest, Hierarchy, Node, NodeId, NodeKind};
use crate::storage::{NodeStore, Project, StoreLock};

/// Loads a kind's nodes together with the store they came from
fn load(project: &Project, kind: NodeKind) -> Result<(NodeStore, BTreeMap<NodeId, Node>)> {
    let store = project.node_store(kind);
    let nodes = store
        .read_all()
        .with_context(|| format!("Failed to load {} nodes", kind))?;
    Ok((store, nodes))
}

/// Like [`load`], but the kind stays locked until the returned guard drops
fn load_for_write(
    project: &Project,
    kind: NodeKind,
) -> Result<(NodeStore, StoreLock, BTreeMap<NodeId, Node>)> {
    let store = project.node_store(kind);
    let lock = store.lock()?;
    let nodes = store
        .read_all()
        .with_context(|| format!("Failed to load {} nodes", kind))?;
    Ok((store, lock, nodes))
}

fn parse_id(raw: &str) -> Result<NodeId> {
    Ok(raw.parse()?)
}

fn find<'a>(nodes: &'a BTreeMap<NodeId, Node>, kind: NodeKind, id: NodeId) -> Result<&'a Node> {
    nodes
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("{} not found: {}", capitalize(kind.as_str()), id))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-readable path from the root, e.g. `Apparel > Shoes > Sneakers`
fn breadcrumb(hierarchy: &Hierarchy, nodes: &BTreeMap<NodeId, Node>, id: NodeId) -> String {
    let mut names: Vec<&str> = hierarchy
        .ancestors(id)
        .iter()
        .rev()
        .filter_map(|a| nodes.get(a).map(|n| n.name.as_str()))
        .collect();
    if let Some(node) = nodes.get(&id) {
        names.push(&node.name);
    }
    names.join(" > ")
}

pub fn add(
    output: &Output,
    kind: NodeKind,
    name: &str,
    parent: Option<&str>,
    order: Option<i64>,
    fields: &[String],
) -> Result<()> {
    let project = Project::open_current()?;
    let (store, _lock, nodes) = load_for_write(&project, kind)?;

    let parent = parent.map(parse_id).transpose()?;
    let max_depth = project.max_depth(kind);
    output.verbose_ctx(
        "add",
        &format!(
            "Checking parent {:?} against max depth {}",
            parent.map(|p| p.to_string()),
            max_depth
        ),
    );

    let hierarchy = Hierarchy::new(nodes.values());
    hierarchy
        .validate_parent(None, parent, max_depth, project.cycle_policy())
        .with_context(|| format!("Cannot add {} '{}'", kind, name))?;

    let id = NodeStore::allocate_id(&nodes)?;
    let mut node = Node::new(id, name).with_parent(parent).with_order(order);

    for raw in fields {
        let (key, value) = parse_field_assignment(raw)?;
        node.set_field(kind, &key, value)?;
    }

    store.append(&node)?;

    let depth = parent.map(|p| hierarchy.depth_of(Some(p)) + 1).unwrap_or(0);

    output.changed(
        &format!("Created {} {} - {}", kind, node.id, node.name),
        &serde_json::json!({
            "kind": kind,
            "id": node.id,
            "name": node.name,
            "parent_id": node.parent_id,
            "depth": depth,
            "fields": node.fields,
        }),
    );

    Ok(())
}

pub fn reparent(
    output: &Output,
    kind: NodeKind,
    id_str: &str,
    parent: Option<&str>,
) -> Result<()> {
    let project = Project::open_current()?;
    let (store, _lock, nodes) = load_for_write(&project, kind)?;

    let id = parse_id(id_str)?;
    let parent = parent.map(parse_id).transpose()?;
    let mut node = find(&nodes, kind, id)?.clone();

    if node.parent_id == parent {
        output.verbose_ctx("move", "Parent unchanged");
        output.success(&format!("{} {} already in place", capitalize(kind.as_str()), id));
        return Ok(());
    }

    let hierarchy = Hierarchy::new(nodes.values());
    let max_depth = project.max_depth(kind);
    output.verbose_ctx(
        "move",
        &format!(
            "Subtree height of {} is {}, max depth {}",
            id,
            hierarchy.subtree_height(id),
            max_depth
        ),
    );

    hierarchy
        .validate_parent(Some(id), parent, max_depth, project.cycle_policy())
        .with_context(|| format!("Cannot move {} {}", kind, id))?;

    node.reparent(parent);
    store.update(&node)?;

    let message = match parent {
        Some(p) => format!("Moved {} {} under {}", kind, id, p),
        None => format!("Moved {} {} to the root level", kind, id),
    };
    output.changed(
        &message,
        &serde_json::json!({
            "kind": kind,
            "id": node.id,
            "parent_id": node.parent_id,
        }),
    );

    Ok(())
}

pub fn set_field(
    output: &Output,
    kind: NodeKind,
    id_str: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let project = Project::open_current()?;
    let (store, _lock, nodes) = load_for_write(&project, kind)?;

    let id = parse_id(id_str)?;
    let mut node = find(&nodes, kind, id)?.clone();

    match key {
        "name" => {
            if value.trim().is_empty() {
                anyhow::bail!("Name cannot be empty");
            }
            node.name = value.to_string();
            node.updated_at = chrono::Utc::now();
        }
        "order" => {
            let order: i64 = value
                .parse()
                .with_context(|| format!("Order must be an integer, got '{}'", value))?;
            node.order = Some(order);
            node.updated_at = chrono::Utc::now();
        }
        _ => node.set_field(kind, key, value)?,
    }

    store.update(&node)?;

    output.changed(&format!("Updated {} {}: {} = {}", kind, id, key, value), &node);

    Ok(())
}

pub fn show(output: &Output, kind: NodeKind, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let (_, nodes) = load(&project, kind)?;

    let id = parse_id(id_str)?;
    let node = find(&nodes, kind, id)?;

    let hierarchy = Hierarchy::new(nodes.values());
    let depth = hierarchy.depth_of(Some(id));
    let max_depth = project.max_depth(kind);
    let accepts_children = !hierarchy.would_exceed_max_depth(id, max_depth, None);
    let children = hierarchy.children(id);

    if output.is_json() {
        output.data(&serde_json::json!({
            "kind": kind,
            "id": node.id,
            "name": node.name,
            "parent_id": node.parent_id,
            "order": node.order,
            "fields": node.fields,
            "depth": depth,
            "path": breadcrumb(&hierarchy, &nodes, id),
            "children": children,
            "accepts_children": accepts_children,
            "created_at": node.created_at,
            "updated_at": node.updated_at,
        }));
    } else {
        println!("{}: {}", capitalize(kind.as_str()), node.id);
        println!("Name: {}", node.name);
        println!("Path: {}", breadcrumb(&hierarchy, &nodes, id));
        println!("Depth: {} (max {})", depth, max_depth);
        if let Some(order) = node.order {
            println!("Order: {}", order);
        }
        println!("Created: {}", node.created_at.format("%Y-%m-%d %H:%M"));
        println!("Updated: {}", node.updated_at.format("%Y-%m-%d %H:%M"));

        if !node.fields.is_empty() {
            println!("\nFields:");
            for (key, value) in &node.fields {
                println!("  {}: {}", key, value);
            }
        }

        if !children.is_empty() {
            println!("\nChildren:");
            for child in children {
                let name = nodes.get(child).map(|n| n.name.as_str()).unwrap_or("?");
                println!("  {} {}", child, name);
            }
        }

        if !accepts_children {
            println!("\nAt maximum depth: cannot take children");
        }
    }

    Ok(())
}

pub fn list(output: &Output, kind: NodeKind, tree: bool) -> Result<()> {
    let project = Project::open_current()?;
    let (_, nodes) = load(&project, kind)?;
    output.verbose_ctx("list", &format!("Loaded {} {} nodes", nodes.len(), kind));

    let forest = Forest::from_nodes(nodes.values());
    let walk = forest.walk(|id| nodes.get(&id).map(Node::sort_key));
    let depths = forest.hierarchy().depths();

    if output.is_json() {
        let items: Vec<_> = if tree {
            walk.iter()
                .filter_map(|(id, level)| nodes.get(id).map(|n| (n, *level)))
                .map(|(n, level)| {
                    serde_json::json!({
                        "id": n.id,
                        "name": n.name,
                        "parent_id": n.parent_id,
                        "level": level,
                    })
                })
                .collect()
        } else {
            nodes
                .values()
                .map(|n| {
                    serde_json::json!({
                        "id": n.id,
                        "name": n.name,
                        "parent_id": n.parent_id,
                        "depth": depths.get(&n.id).copied().unwrap_or(0),
                        "fields": n.fields,
                    })
                })
                .collect()
        };
        output.data(&items);
    } else if nodes.is_empty() {
        println!("No {} nodes", kind);
    } else if tree {
        for (id, level) in &walk {
            let Some(node) = nodes.get(id) else {
                continue;
            };
            let indent = "  ".repeat(*level);
            match node.parent_id.filter(|p| !nodes.contains_key(p)) {
                Some(missing) => println!(
                    "{}{} ({}) [parent {} missing]",
                    indent, node.name, id, missing
                ),
                None => println!("{}{} ({})", indent, node.name, id),
            }
        }

        let hidden = nodes.len().saturating_sub(walk.len());
        if hidden > 0 {
            println!();
            println!(
                "{} node(s) caught in parent loops are not shown; run 'ctree check {}'",
                hidden, kind
            );
        }
    } else {
        println!("{:<8} {:<8} {:<6} NAME", "ID", "PARENT", "DEPTH");
        println!("{}", "-".repeat(60));
        for node in nodes.values() {
            let parent = node
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let depth = depths.get(&node.id).copied().unwrap_or(0);
            println!("{:<8} {:<8} {:<6} {}", node.id, parent, depth, node.name);
        }
    }

    Ok(())
}

pub fn remove(output: &Output, kind: NodeKind, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let (store, _lock, nodes) = load_for_write(&project, kind)?;

    let id = parse_id(id_str)?;
    find(&nodes, kind, id)?;

    let hierarchy = Hierarchy::new(nodes.values());
    let children = hierarchy.children(id);
    if !children.is_empty() {
        anyhow::bail!(
            "{} {} has {} child node(s); move or remove them first",
            capitalize(kind.as_str()),
            id,
            children.len()
        );
    }

    store.remove(id)?;

    output.changed(
        &format!("Removed {} {}", kind, id),
        &serde_json::json!({
            "kind": kind,
            "id": id,
            "removed": true,
        }),
    );

    Ok(())
}
