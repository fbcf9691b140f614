//! Tree Operations
//!
//! The structural mutations: create, mkdir, symlink, mknod, tmpfile,
//! link, unlink, rmdir, rename, lookup, readdir, and the content entry
//! points. Every operation is all-or-nothing: a failure leaves no
//! binding half-made and no node orphaned.
//!
//! Locking discipline, in acquisition order:
//! 1. The tree lock is held by every rename and rmdir, the operations
//!    that lock more than one pre-existing directory at once. It also
//!    keeps directory parentage stable for the rename cycle check.
//! 2. Node data locks: parent directory before child node; the two
//!    parents of a cross-directory rename in ascending node-id order.
//!    Operations outside the tree lock never hold two pre-existing node
//!    locks (a freshly built, unshared node does not count).
//! 3. The store map lock is innermost; no node lock is acquired while
//!    holding it.
//! Link counts, sizes, and handle counts are atomics and need no lock.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;

use crate::dir::{validate_name, DirEntry};
use crate::error::{FsError, FsResult};
use crate::mount::{MemFs, NodeRef};
use crate::node::{DeviceId, FileMode, Node, NodeId, NodeType};

impl MemFs {
    /// Every handle is bound to the mount that opened it; honoring one
    /// from another mount would splice foreign node ids into this tree.
    fn check_same_mount(&self, handle: &NodeRef) -> FsResult<()> {
        if !Arc::ptr_eq(&handle.store, &self.store) {
            return Err(FsError::InvalidArgument);
        }
        Ok(())
    }

    /// A directory with no links left has been removed from the tree; a
    /// stale handle must not bind new entries into it. Callers hold the
    /// directory's data lock, which orders this against the removal
    /// marking in `rmdir` and `check_overwrite`.
    fn check_dir_alive(dir: &Arc<Node>) -> FsResult<()> {
        if dir.nlink.load(Ordering::SeqCst) == 0 {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    /// Look up a name in a directory, opening a handle on the bound node
    pub fn lookup(&self, dir: &NodeRef, name: &str) -> FsResult<NodeRef> {
        self.check_same_mount(dir)?;
        let child_id = {
            let data = dir.node.data.lock();
            data.dir_index()?.lookup(name).ok_or(FsError::NotFound)?
        };
        let node = self.store.get(child_id)?;
        Ok(self.open_node(node))
    }

    /// Create a regular file bound under `dir`
    pub fn create(&self, dir: &NodeRef, name: &str, mode: FileMode) -> FsResult<NodeRef> {
        let mode = FileMode::new(FileMode::S_IFREG | mode.permissions());
        self.bind_new(dir, name, |id, uid, gid| Node::new_file(id, mode, uid, gid))
    }

    /// Create a subdirectory bound under `dir`
    pub fn mkdir(&self, dir: &NodeRef, name: &str, mode: FileMode) -> FsResult<NodeRef> {
        let mode = FileMode::new(FileMode::S_IFDIR | mode.permissions());
        let parent_id = dir.node.id();
        self.bind_new(dir, name, |id, uid, gid| {
            Node::new_dir(id, mode, uid, gid, parent_id)
        })
    }

    /// Create a symbolic link to `target` bound under `dir`
    pub fn symlink(&self, dir: &NodeRef, name: &str, target: &str) -> FsResult<NodeRef> {
        self.bind_new(dir, name, |id, uid, gid| {
            Node::new_symlink(id, String::from(target), uid, gid)
        })
    }

    /// Create a node of the kind encoded in `mode`'s type bits. Types
    /// other than regular file, directory, and symlink become special
    /// nodes carrying `dev`.
    pub fn mknod(
        &self,
        dir: &NodeRef,
        name: &str,
        mode: FileMode,
        dev: DeviceId,
    ) -> FsResult<NodeRef> {
        match mode.node_type() {
            NodeType::File => self.create(dir, name, mode),
            NodeType::Directory => self.mkdir(dir, name, mode),
            // A symlink made this way has no target to store; the empty
            // target is permanent because targets are fixed at creation.
            NodeType::Symlink => self.bind_new(dir, name, |id, uid, gid| {
                Node::new_symlink(id, String::new(), uid, gid)
            }),
            NodeType::Special => {
                self.bind_new(dir, name, |id, uid, gid| {
                    Node::new_special(id, mode, uid, gid, dev)
                })
            }
        }
    }

    /// Allocate an unbound regular file, visible only through the
    /// returned handle. With no directory entry its link count is 0, so
    /// dropping the last handle reclaims it immediately.
    pub fn tmpfile(&self, dir: &NodeRef, mode: FileMode) -> FsResult<NodeRef> {
        self.check_writable()?;
        self.check_same_mount(dir)?;
        let (uid, gid) = {
            let data = dir.node.data.lock();
            data.dir_index()?;
            Self::check_dir_alive(&dir.node)?;
            (data.uid, data.gid)
        };
        let id = self.store.alloc_id();
        let mode = FileMode::new(FileMode::S_IFREG | mode.permissions());
        let node = Arc::new(Node::new_file(id, mode, uid, gid));
        node.nlink.store(0, Ordering::SeqCst);
        self.store.install(Arc::clone(&node))?;
        debug!("memfs: tmpfile node {}", id.as_u64());
        Ok(self.open_node(node))
    }

    /// Bind an additional name to an existing non-directory node
    pub fn link(&self, dir: &NodeRef, name: &str, target: &NodeRef) -> FsResult<()> {
        self.check_writable()?;
        self.check_same_mount(dir)?;
        self.check_same_mount(target)?;
        validate_name(name)?;
        if target.node.node_type() == NodeType::Directory {
            return Err(FsError::IsADirectory);
        }
        let parent = &dir.node;
        let mut data = parent.data.lock();
        let index = data.dir_index_mut()?;
        Self::check_dir_alive(parent)?;
        index.insert(name, target.node.id())?;
        target.node.nlink.fetch_add(1, Ordering::SeqCst);
        data.touch();
        drop(data);
        target.node.touch_ctime();
        debug!(
            "memfs: linked {:?} -> node {}",
            name,
            target.node.id().as_u64()
        );
        Ok(())
    }

    /// Remove a non-directory binding. The node itself is reclaimed once
    /// its last binding and last open handle are gone.
    pub fn unlink(&self, dir: &NodeRef, name: &str) -> FsResult<()> {
        self.check_writable()?;
        self.check_same_mount(dir)?;
        validate_name(name)?;
        let parent = &dir.node;
        let child = {
            let mut data = parent.data.lock();
            let index = data.dir_index_mut()?;
            let child_id = index.lookup(name).ok_or(FsError::NotFound)?;
            let child = self.store.get(child_id)?;
            if child.node_type() == NodeType::Directory {
                return Err(FsError::IsADirectory);
            }
            index.remove(name)?;
            data.touch();
            child
        };
        let left = child.nlink.fetch_sub(1, Ordering::SeqCst) - 1;
        child.touch_ctime();
        debug!(
            "memfs: unlinked {:?} (node {}, {} links left)",
            name,
            child.id().as_u64(),
            left
        );
        if left == 0 {
            self.store.try_release(&child);
        }
        Ok(())
    }

    /// Remove an empty subdirectory
    pub fn rmdir(&self, dir: &NodeRef, name: &str) -> FsResult<()> {
        self.check_writable()?;
        self.check_same_mount(dir)?;
        validate_name(name)?;
        let _tree = self.tree_lock.lock();
        let parent = &dir.node;
        let child = {
            let mut data = parent.data.lock();
            let index = data.dir_index_mut()?;
            let child_id = index.lookup(name).ok_or(FsError::NotFound)?;
            let child = self.store.get(child_id)?;
            if child.node_type() != NodeType::Directory {
                return Err(FsError::NotADirectory);
            }
            {
                let child_data = child.data.lock();
                if !child_data.dir_index()?.is_empty() {
                    return Err(FsError::NotEmpty);
                }
                // Clear the link count (self entry plus the parent's
                // binding) while still holding the child's lock, so a
                // bind through a stale handle cannot slip in after the
                // emptiness check.
                child.nlink.store(0, Ordering::SeqCst);
            }
            index.remove(name)?;
            // The removed subdirectory no longer references its parent.
            parent.nlink.fetch_sub(1, Ordering::SeqCst);
            data.touch();
            child
        };
        debug!("memfs: removed directory {:?} (node {})", name, child.id().as_u64());
        self.store.try_release(&child);
        Ok(())
    }

    /// Atomically move a binding, replacing any existing destination with
    /// unlink semantics. Observers see either the old or the new binding,
    /// never neither or both.
    pub fn rename(
        &self,
        src_dir: &NodeRef,
        src_name: &str,
        dst_dir: &NodeRef,
        dst_name: &str,
    ) -> FsResult<()> {
        self.check_writable()?;
        self.check_same_mount(src_dir)?;
        self.check_same_mount(dst_dir)?;
        validate_name(src_name)?;
        validate_name(dst_name)?;
        let _tree = self.tree_lock.lock();
        if src_dir.node.id() == dst_dir.node.id() {
            self.rename_within(&src_dir.node, src_name, dst_name)
        } else {
            self.rename_across(&src_dir.node, src_name, &dst_dir.node, dst_name)
        }
    }

    /// List a directory in name order. Unbound tmpfile nodes never appear.
    pub fn readdir(&self, dir: &NodeRef) -> FsResult<Vec<DirEntry>> {
        self.check_same_mount(dir)?;
        let data = dir.node.data.lock();
        let index = data.dir_index()?;
        let mut entries = Vec::with_capacity(index.len());
        for (name, id) in index.iter() {
            let node_type = self.store.get(id)?.node_type();
            entries.push(DirEntry {
                name: String::from(name),
                id,
                node_type,
            });
        }
        Ok(entries)
    }

    /// Read file content at an offset into `dst`
    pub fn read_at(&self, file: &NodeRef, off: u64, dst: &mut [u8]) -> FsResult<usize> {
        self.check_same_mount(file)?;
        file.node.read_at(off, dst)
    }

    /// Write `src` into file content at an offset
    pub fn write_at(&self, file: &NodeRef, off: u64, src: &[u8]) -> FsResult<usize> {
        self.check_writable()?;
        self.check_same_mount(file)?;
        file.node.write_at(off, src, self.store.budget())
    }

    /// Truncate file content to `len` bytes
    pub fn truncate(&self, file: &NodeRef, len: u64) -> FsResult<()> {
        self.check_writable()?;
        self.check_same_mount(file)?;
        file.node.truncate_content(len, self.store.budget())
    }

    /// Read a symlink's target
    pub fn readlink(&self, link: &NodeRef) -> FsResult<String> {
        self.check_same_mount(link)?;
        link.node.readlink()
    }

    /// Common path for every operation that binds a fresh node: check
    /// uniqueness under the parent lock, then allocate, install, and
    /// bind. Allocation happens only after the uniqueness check, so a
    /// failed insert can never orphan a node.
    fn bind_new(
        &self,
        dir: &NodeRef,
        name: &str,
        build: impl FnOnce(NodeId, u32, u32) -> Node,
    ) -> FsResult<NodeRef> {
        self.check_writable()?;
        self.check_same_mount(dir)?;
        validate_name(name)?;
        let parent = &dir.node;
        let mut data = parent.data.lock();
        let (uid, gid) = (data.uid, data.gid);
        let index = data.dir_index_mut()?;
        Self::check_dir_alive(parent)?;
        if index.contains(name) {
            return Err(FsError::AlreadyExists);
        }
        let id = self.store.alloc_id();
        let node = Arc::new(build(id, uid, gid));
        let node_type = node.node_type();
        self.store.install(Arc::clone(&node))?;
        index.insert(name, id)?;
        if node_type == NodeType::Directory {
            // The new subdirectory's implicit `..` references the parent.
            parent.nlink.fetch_add(1, Ordering::SeqCst);
        }
        data.touch();
        drop(data);
        debug!(
            "memfs: bound {:?} as {:?} (node {})",
            name,
            node_type,
            id.as_u64()
        );
        Ok(self.open_node(node))
    }

    /// Rename within one directory. Caller holds the tree lock.
    fn rename_within(&self, dir: &Arc<Node>, src_name: &str, dst_name: &str) -> FsResult<()> {
        let (src_node, replaced) = {
            let mut data = dir.data.lock();
            let index = data.dir_index_mut()?;
            let src_id = index.lookup(src_name).ok_or(FsError::NotFound)?;
            if src_name == dst_name {
                return Ok(());
            }
            let src_node = self.store.get(src_id)?;
            let replaced = match index.lookup(dst_name) {
                // Two bindings of the same node; nothing to do.
                Some(dst_id) if dst_id == src_id => return Ok(()),
                Some(dst_id) => {
                    let dst_node = self.store.get(dst_id)?;
                    self.check_overwrite(&src_node, &dst_node)?;
                    index.remove(dst_name)?;
                    self.drop_replaced_binding(dir, &dst_node);
                    Some(dst_node)
                }
                None => None,
            };
            index.remove(src_name)?;
            index.insert(dst_name, src_id)?;
            data.touch();
            (src_node, replaced)
        };
        src_node.touch_ctime();
        if let Some(dst_node) = replaced {
            self.store.try_release(&dst_node);
        }
        debug!("memfs: renamed {:?} -> {:?}", src_name, dst_name);
        Ok(())
    }

    /// Rename across two directories. Caller holds the tree lock.
    fn rename_across(
        &self,
        src_parent: &Arc<Node>,
        src_name: &str,
        dst_parent: &Arc<Node>,
        dst_name: &str,
    ) -> FsResult<()> {
        // Cycle check before any directory lock: a directory must not
        // move into its own subtree. Parentage is stable here because
        // directories only change parent under the tree lock.
        let moved_id = {
            let data = src_parent.data.lock();
            data.dir_index()?.lookup(src_name).ok_or(FsError::NotFound)?
        };
        let moved = self.store.get(moved_id)?;
        if moved.node_type() == NodeType::Directory {
            self.ensure_outside_subtree(dst_parent.id(), moved_id)?;
        }

        // Lock both parents in ascending node-id order.
        let (mut src_data, mut dst_data) = if src_parent.id() < dst_parent.id() {
            let src = src_parent.data.lock();
            let dst = dst_parent.data.lock();
            (src, dst)
        } else {
            let dst = dst_parent.data.lock();
            let src = src_parent.data.lock();
            (src, dst)
        };
        let src_index = src_data.dir_index_mut()?;
        let dst_index = dst_data.dir_index_mut()?;
        // A removed destination directory (its index is gone from the
        // tree even if a handle survives) must not receive the binding.
        Self::check_dir_alive(dst_parent)?;

        // Re-resolve under the locks: the binding may have changed while
        // unlocked. A directory created in the gap is empty and cannot
        // contain the destination, so the cycle check still holds.
        let src_id = src_index.lookup(src_name).ok_or(FsError::NotFound)?;
        let src_node = if src_id == moved_id {
            moved
        } else {
            self.store.get(src_id)?
        };
        let src_is_dir = src_node.node_type() == NodeType::Directory;

        let replaced = match dst_index.lookup(dst_name) {
            Some(dst_id) if dst_id == src_id => return Ok(()),
            Some(dst_id) => {
                let dst_node = self.store.get(dst_id)?;
                self.check_overwrite(&src_node, &dst_node)?;
                dst_index.remove(dst_name)?;
                self.drop_replaced_binding(dst_parent, &dst_node);
                Some(dst_node)
            }
            None => None,
        };

        src_index.remove(src_name)?;
        dst_index.insert(dst_name, src_id)?;
        if src_is_dir {
            // The moved directory's implicit `..` switches parents.
            src_parent.nlink.fetch_sub(1, Ordering::SeqCst);
            dst_parent.nlink.fetch_add(1, Ordering::SeqCst);
            let mut child_data = src_node.data.lock();
            if let Ok(child_index) = child_data.dir_index_mut() {
                child_index.set_parent(dst_parent.id());
            }
        }
        src_data.touch();
        dst_data.touch();
        drop(src_data);
        drop(dst_data);

        src_node.touch_ctime();
        if let Some(dst_node) = replaced {
            self.store.try_release(&dst_node);
        }
        debug!(
            "memfs: renamed {:?} (dir {}) -> {:?} (dir {})",
            src_name,
            src_parent.id().as_u64(),
            dst_name,
            dst_parent.id().as_u64()
        );
        Ok(())
    }

    /// Verify that an existing destination binding may be replaced. On
    /// success for a directory destination, its link count is cleared
    /// under its own lock (the replacement is then committed by the
    /// caller without any further fallible step), so a bind through a
    /// stale handle cannot race the emptiness check.
    fn check_overwrite(&self, src_node: &Arc<Node>, dst_node: &Arc<Node>) -> FsResult<()> {
        let src_is_dir = src_node.node_type() == NodeType::Directory;
        let dst_is_dir = dst_node.node_type() == NodeType::Directory;
        if dst_is_dir {
            if !src_is_dir {
                return Err(FsError::IsADirectory);
            }
            let dst_data = dst_node.data.lock();
            if !dst_data.dir_index()?.is_empty() {
                return Err(FsError::NotEmpty);
            }
            // Self entry and the parent's binding are both going away.
            dst_node.nlink.store(0, Ordering::SeqCst);
        } else if src_is_dir {
            return Err(FsError::NotADirectory);
        }
        Ok(())
    }

    /// Account for a destination binding removed by rename overwrite.
    /// Caller has already removed the binding and calls `try_release`
    /// after the directory locks are dropped.
    fn drop_replaced_binding(&self, parent: &Arc<Node>, dst_node: &Arc<Node>) {
        if dst_node.node_type() == NodeType::Directory {
            // Link count already cleared in `check_overwrite`; the
            // parent loses a subdirectory.
            parent.nlink.fetch_sub(1, Ordering::SeqCst);
        } else {
            dst_node.nlink.fetch_sub(1, Ordering::SeqCst);
            dst_node.touch_ctime();
        }
    }

    /// Walk from `start` up to the root, failing with `InvalidMove` if
    /// `forbidden` appears on the ancestor chain (including `start`
    /// itself). Caller holds the tree lock.
    fn ensure_outside_subtree(&self, start: NodeId, forbidden: NodeId) -> FsResult<()> {
        let mut current = start;
        loop {
            if current == forbidden {
                return Err(FsError::InvalidMove);
            }
            if current == self.root.id() {
                return Ok(());
            }
            let node = self.store.get(current)?;
            let parent = {
                let data = node.data.lock();
                data.dir_index()?.parent()
            };
            current = parent;
        }
    }
}
