//! JSONL storage for nodes
//!
//! Each hierarchy kind is stored in `.catalog/{kind}.jsonl` with one JSON
//! object per line. Uses file locking for concurrent access safety:
//! commands that change a kind hold `.catalog/{kind}.lock` exclusively from
//! the first read to the last write.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

use crate::domain::{Node, NodeId, NodeKind};

/// Exclusive hold on one kind's store; released when dropped
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

/// Store for one kind's nodes in JSONL format
pub struct NodeStore {
    kind: NodeKind,
    path: PathBuf,
}

impl NodeStore {
    /// Creates a new node store at the given path
    pub fn new(kind: NodeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Creates the default store for a kind within a project
    pub fn for_project(project_root: &Path, kind: NodeKind) -> Self {
        Self::new(kind, project_root.join(".catalog").join(kind.file_name()))
    }

    /// Returns the kind of node held by this store
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the kind-wide lock file next to the store
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Blocks until this process is the only writer of the kind
    pub fn lock(&self) -> Result<StoreLock> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {} nodes", self.kind))?;

        debug!(kind = %self.kind, "acquired store lock");

        Ok(StoreLock { _file: file })
    }

    /// Reads all nodes from the store, keyed and ordered by ID.
    /// Later lines for the same ID replace earlier ones.
    pub fn read_all(&self) -> Result<BTreeMap<NodeId, Node>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open node store: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on node store")?;

        let reader = BufReader::new(&file);
        let mut nodes = BTreeMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let node: Node = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse {} node at line {}",
                    self.kind,
                    line_num + 1
                )
            })?;

            nodes.insert(node.id, node);
        }

        debug!(kind = %self.kind, count = nodes.len(), "read node store");

        // Lock is released when file is dropped
        Ok(nodes)
    }

    /// ID for a new node: one past the highest in `nodes`.
    /// Call with nodes read under [`NodeStore::lock`].
    pub fn allocate_id(nodes: &BTreeMap<NodeId, Node>) -> Result<NodeId> {
        match nodes.keys().next_back() {
            Some(last) => Ok(last.next()?),
            None => Ok(NodeId::first()),
        }
    }

    /// Writes all nodes to the store (full rewrite)
    pub fn write_all(&self, nodes: &BTreeMap<NodeId, Node>) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on node store")?;

            let mut writer = BufWriter::new(&file);

            // BTreeMap keeps lines in ID order
            for node in nodes.values() {
                let line = serde_json::to_string(node).context("Failed to serialize node")?;
                writeln!(writer, "{}", line).context("Failed to write node")?;
            }

            writer.flush().context("Failed to flush node store")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        debug!(kind = %self.kind, count = nodes.len(), "rewrote node store");

        Ok(())
    }

    /// Appends a single node (used for creation without full rewrite)
    pub fn append(&self, node: &Node) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open node store: {}", self.path.display()))?;

        // Acquire exclusive lock
        file.lock_exclusive()
            .context("Failed to acquire write lock on node store")?;

        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(node).context("Failed to serialize node")?;
        writeln!(writer, "{}", line).context("Failed to write node")?;

        writer.flush().context("Failed to flush node store")?;

        debug!(kind = %self.kind, id = %node.id, "appended node");

        Ok(())
    }

    /// Updates a single node (reads all, updates, writes all)
    pub fn update(&self, node: &Node) -> Result<()> {
        let mut nodes = self.read_all()?;
        nodes.insert(node.id, node.clone());
        self.write_all(&nodes)
    }

    /// Removes a node by ID
    pub fn remove(&self, id: NodeId) -> Result<bool> {
        let mut nodes = self.read_all()?;
        let removed = nodes.remove(&id).is_some();
        if removed {
            self.write_all(&nodes)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_node(n: u64) -> Node {
        Node::new(NodeId::new(n).unwrap(), format!("Node {}", n))
    }

    fn store_in(dir: &TempDir) -> NodeStore {
        NodeStore::new(NodeKind::Category, dir.path().join("category.jsonl"))
    }

    #[test]
    fn read_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let nodes = store.read_all().unwrap();
        assert!(nodes.is_empty());
        assert_eq!(NodeStore::allocate_id(&nodes).unwrap(), NodeId::first());
    }

    #[test]
    fn write_and_read_nodes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let root = make_node(1);
        let child = make_node(2).with_parent(Some(root.id));

        let mut nodes = BTreeMap::new();
        nodes.insert(root.id, root.clone());
        nodes.insert(child.id, child.clone());
        store.write_all(&nodes).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&child.id].parent_id, Some(root.id));
        assert_eq!(loaded[&root.id].name, root.name);
    }

    #[test]
    fn append_and_next_id() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append(&make_node(1)).unwrap();
        store.append(&make_node(5)).unwrap();

        let nodes = store.read_all().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(NodeStore::allocate_id(&nodes).unwrap().get(), 6);
    }

    #[test]
    fn allocate_id_fails_at_the_top_of_the_range() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append(&make_node(u64::MAX)).unwrap();

        let nodes = store.read_all().unwrap();
        let err = NodeStore::allocate_id(&nodes).unwrap_err();
        assert!(format!("{:#}", err).contains("No node ID left"));
    }

    #[test]
    fn lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let guard = store.lock().unwrap();
        assert!(store.lock_path().ends_with("category.lock"));

        let other = OpenOptions::new()
            .write(true)
            .open(store.lock_path())
            .unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(guard);
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn locked_writers_do_not_lose_nodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("category.jsonl");

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = NodeStore::new(NodeKind::Category, path);
                    let _lock = store.lock().unwrap();
                    let nodes = store.read_all().unwrap();
                    let id = NodeStore::allocate_id(&nodes).unwrap();
                    let node = Node::new(id, format!("Writer {}", n));
                    store.append(&node).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let nodes = NodeStore::new(NodeKind::Category, path).read_all().unwrap();
        assert_eq!(nodes.len(), 8);
        assert_eq!(NodeStore::allocate_id(&nodes).unwrap().get(), 9);
    }

    #[test]
    fn update_node() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append(&make_node(1)).unwrap();
        let mut node = make_node(2);
        store.append(&node).unwrap();

        node.reparent(Some(NodeId::new(1).unwrap()));
        store.update(&node).unwrap();

        let loaded = store.read_all().unwrap().remove(&node.id).unwrap();
        assert_eq!(loaded.parent_id, Some(NodeId::new(1).unwrap()));
    }

    #[test]
    fn remove_node() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append(&make_node(1)).unwrap();
        store.append(&make_node(2)).unwrap();

        assert!(store.remove(NodeId::new(1).unwrap()).unwrap());
        assert!(!store.remove(NodeId::new(1).unwrap()).unwrap());

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&NodeId::new(2).unwrap()));
    }

    #[test]
    fn later_lines_win() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut node = make_node(1);
        store.append(&node).unwrap();
        node.name = "Renamed".to_string();
        store.append(&node).unwrap();

        assert_eq!(store.read_all().unwrap()[&node.id].name, "Renamed");
        assert_eq!(store.read_all().unwrap().len(), 1);

        // a full rewrite leaves one line per node
        store.update(&node).unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn corrupt_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.append(&make_node(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = store.read_all().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = NodeStore::new(
            NodeKind::Media,
            dir.path().join("nested").join("dir").join("media.jsonl"),
        );

        store.append(&make_node(1)).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn atomic_write() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let node = make_node(1);
        let mut nodes = BTreeMap::new();
        nodes.insert(node.id, node);
        store.write_all(&nodes).unwrap();

        // Temp file should not exist after write
        let temp_path = store.path().with_extension("jsonl.tmp");
        assert!(!temp_path.exists());
    }
}
