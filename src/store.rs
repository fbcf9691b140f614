//! Node Store
//!
//! Arena of all live nodes, indexed by id. A node stays in the arena
//! while it is reachable from the root (link count > 0) or referenced by
//! an open handle; when both counts are zero its slot is reclaimed and
//! its memory charge released. Allocations are charged against a mount
//! byte budget so exhaustion surfaces as `NoSpace` instead of unbounded
//! growth.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use spin::RwLock;

use crate::error::{FsError, FsResult};
use crate::node::{Node, NodeId, NodeKind};

/// Accounting charge per node, covering metadata and index overhead
const NODE_BASE_COST: u64 = 256;

/// Mount-wide memory accounting
pub struct ByteBudget {
    used: AtomicU64,
    /// Maximum charge in bytes; 0 means unlimited
    max: u64,
}

impl ByteBudget {
    fn new(max: u64) -> Self {
        Self {
            used: AtomicU64::new(0),
            max,
        }
    }

    /// Charge bytes against the budget, failing with `NoSpace` when the
    /// limit would be exceeded. Nothing is charged on failure.
    pub(crate) fn charge(&self, bytes: u64) -> FsResult<()> {
        if bytes == 0 {
            return Ok(());
        }
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(bytes).ok_or(FsError::NoSpace)?;
            if self.max > 0 && next > self.max {
                return Err(FsError::NoSpace);
            }
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(seen) => current = seen,
            }
        }
    }

    /// Return bytes to the budget
    pub(crate) fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Bytes currently charged
    pub(crate) fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Configured limit; 0 means unlimited
    pub(crate) fn max(&self) -> u64 {
        self.max
    }
}

/// Owner of every node in one mount
pub struct NodeStore {
    /// Live nodes by id
    nodes: RwLock<BTreeMap<NodeId, Arc<Node>>>,
    /// Next id to hand out
    next_id: AtomicU64,
    /// Memory accounting for nodes and file content
    budget: ByteBudget,
}

impl NodeStore {
    pub(crate) fn new(max_bytes: u64) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            budget: ByteBudget::new(max_bytes),
        }
    }

    /// Allocate a fresh node id
    pub(crate) fn alloc_id(&self) -> NodeId {
        NodeId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Add a freshly built node to the arena, charging its base cost
    pub(crate) fn install(&self, node: Arc<Node>) -> FsResult<()> {
        self.budget.charge(NODE_BASE_COST)?;
        self.nodes.write().insert(node.id(), node);
        Ok(())
    }

    /// Fetch a live node by id
    pub(crate) fn get(&self, id: NodeId) -> FsResult<Arc<Node>> {
        self.nodes.read().get(&id).cloned().ok_or(FsError::NotFound)
    }

    /// Reclaim a node if it is no longer reachable and no handle is open.
    /// Safe to call on any node; only the caller that actually removes the
    /// arena slot releases the charge.
    pub(crate) fn try_release(&self, node: &Arc<Node>) {
        if node.nlink.load(Ordering::SeqCst) != 0 || node.handles.load(Ordering::SeqCst) != 0 {
            return;
        }
        let removed = {
            let mut nodes = self.nodes.write();
            // Recheck under the map lock: a lookup may have opened a handle
            // between the counter check and here.
            if node.nlink.load(Ordering::SeqCst) != 0 || node.handles.load(Ordering::SeqCst) != 0 {
                return;
            }
            nodes.remove(&node.id()).is_some()
        };
        if removed {
            let content = charged_content_bytes(node);
            self.budget.release(NODE_BASE_COST + content);
            debug!("memfs: reclaimed node {}", node.id().as_u64());
        }
    }

    /// Drop every node and reset the accounting. Called on unmount; any
    /// handle still open afterwards keeps its node alive but detached.
    pub(crate) fn clear(&self) {
        let mut nodes = self.nodes.write();
        let count = nodes.len();
        nodes.clear();
        self.budget.release(self.budget.used());
        if count > 0 {
            debug!("memfs: released {count} nodes");
        }
    }

    /// Number of live nodes
    pub(crate) fn node_count(&self) -> u64 {
        self.nodes.read().len() as u64
    }

    pub(crate) fn budget(&self) -> &ByteBudget {
        &self.budget
    }
}

/// Bytes charged for a node's file content, if any
fn charged_content_bytes(node: &Node) -> u64 {
    let data = node.data.lock();
    match &data.kind {
        NodeKind::File(content) => content.charged_bytes(),
        _ => 0,
    }
}
