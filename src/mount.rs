//! Mount Context
//!
//! One `MemFs` value is one mounted filesystem instance: it owns the node
//! store, the root directory, and the resolved mount options. There is no
//! global mount state; the handle returned by `mount` is threaded through
//! every subsequent call. Dropping or unmounting the handle releases the
//! whole tree.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::info;
use spin::Mutex;

use crate::error::{FsError, FsResult};
use crate::node::{FileMode, Node, NodeId, NodeType, Stat};
use crate::options::{MountFlags, MountOpts};
use crate::store::NodeStore;

/// A mounted in-memory filesystem
pub struct MemFs {
    pub(crate) store: Arc<NodeStore>,
    pub(crate) root: Arc<Node>,
    pub(crate) opts: MountOpts,
    /// Serializes operations that lock more than one pre-existing
    /// directory at once (rename, rmdir). See `ops` for the full
    /// locking discipline.
    pub(crate) tree_lock: Mutex<()>,
}

impl MemFs {
    /// Mount a new filesystem instance from a textual option string
    pub fn mount(options: &str) -> FsResult<Self> {
        Self::mount_with(MountOpts::parse(options)?)
    }

    /// Mount a new filesystem instance from resolved options
    pub fn mount_with(opts: MountOpts) -> FsResult<Self> {
        let store = Arc::new(NodeStore::new(opts.max_bytes));
        let root_id = store.alloc_id();
        let mode = FileMode::new(FileMode::S_IFDIR | opts.mode.permissions());
        // The root is its own parent: its implicit `..` resolves to itself.
        let root = Arc::new(Node::new_dir(root_id, mode, 0, 0, root_id));
        store.install(Arc::clone(&root))?;
        info!(
            "memfs: mounted (root node {}, mode {:o})",
            root_id.as_u64(),
            opts.mode.permissions()
        );
        Ok(Self {
            store,
            root,
            opts,
            tree_lock: Mutex::new(()),
        })
    }

    /// Open a handle on the root directory
    pub fn root(&self) -> NodeRef {
        self.open_node(Arc::clone(&self.root))
    }

    /// Tear the mount down, releasing every node in the tree. Consuming
    /// the handle makes a second mount of the same context
    /// unrepresentable.
    pub fn unmount(self) {
        info!("memfs: unmounting ({} nodes)", self.store.node_count());
        // Drop does the actual teardown.
    }

    /// Render the mount options that diverge from the defaults
    pub fn show_options(&self) -> String {
        self.opts.show()
    }

    /// Filesystem-wide statistics
    pub fn statfs(&self) -> StatFs {
        StatFs {
            block_size: 4096,
            total_bytes: self.store.budget().max(),
            used_bytes: self.store.budget().used(),
            node_count: self.store.node_count(),
            name_max: crate::dir::NAME_MAX as u64,
        }
    }

    pub(crate) fn check_writable(&self) -> FsResult<()> {
        if self.opts.flags.contains(MountFlags::READ_ONLY) {
            return Err(FsError::ReadOnly);
        }
        Ok(())
    }

    /// Wrap a node in a handle, pinning it against reclaim
    pub(crate) fn open_node(&self, node: Arc<Node>) -> NodeRef {
        node.handles.fetch_add(1, Ordering::SeqCst);
        NodeRef {
            node,
            store: Arc::clone(&self.store),
        }
    }
}

impl Drop for MemFs {
    fn drop(&mut self) {
        self.store.clear();
    }
}

/// An open handle on one node
///
/// A node stays alive while it is reachable from the root or at least one
/// handle is open on it; dropping the last handle of an unlinked node
/// reclaims it. Cloning opens another handle.
pub struct NodeRef {
    pub(crate) node: Arc<Node>,
    pub(crate) store: Arc<NodeStore>,
}

impl NodeRef {
    /// The referenced node's id
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// The referenced node's kind tag
    pub fn node_type(&self) -> NodeType {
        self.node.node_type()
    }

    /// Snapshot the referenced node's metadata
    pub fn stat(&self) -> Stat {
        self.node.stat()
    }

    /// Number of directory bindings on the referenced node
    pub fn nlink(&self) -> u32 {
        self.node.nlink()
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("node_type", &self.node_type())
            .finish()
    }
}

impl Clone for NodeRef {
    fn clone(&self) -> Self {
        self.node.handles.fetch_add(1, Ordering::SeqCst);
        Self {
            node: Arc::clone(&self.node),
            store: Arc::clone(&self.store),
        }
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        let remaining = self.node.handles.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.node.nlink.load(Ordering::SeqCst) == 0 {
            self.store.try_release(&self.node);
        }
    }
}

/// Filesystem statistics
#[derive(Debug, Clone, Copy)]
pub struct StatFs {
    /// Accounting block size
    pub block_size: u64,
    /// Configured memory budget; 0 means unlimited
    pub total_bytes: u64,
    /// Bytes currently charged for nodes and content
    pub used_bytes: u64,
    /// Number of live nodes
    pub node_count: u64,
    /// Maximum entry name length
    pub name_max: u64,
}
