//! Directory Index
//!
//! The name-to-node mapping owned by every directory node. Names are
//! unique within one index; `.` and `..` are implicit and never stored.
//! Insert and remove are the only mutators, and both run under the owning
//! directory's node lock, so `insert` is the single detection point for
//! "file exists" conditions.

use std::collections::BTreeMap;

use crate::error::{FsError, FsResult};
use crate::node::{NodeId, NodeType};

/// Maximum entry name length in bytes
pub const NAME_MAX: usize = 255;

/// Name-to-node index of one directory
pub struct DirectoryIndex {
    /// Entries in name order (name -> node id)
    entries: BTreeMap<String, NodeId>,
    /// The directory containing this one; the root points at itself
    parent: NodeId,
}

impl DirectoryIndex {
    pub(crate) fn new(parent: NodeId) -> Self {
        Self {
            entries: BTreeMap::new(),
            parent,
        }
    }

    /// The id of the containing directory
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        self.parent = parent;
    }

    /// Check whether a name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a name
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).copied()
    }

    /// Bind a name to a node id
    pub(crate) fn insert(&mut self, name: &str, id: NodeId) -> FsResult<()> {
        if self.entries.contains_key(name) {
            return Err(FsError::AlreadyExists);
        }
        self.entries.insert(String::from(name), id);
        Ok(())
    }

    /// Remove a binding, returning the node id it pointed at
    pub(crate) fn remove(&mut self, name: &str) -> FsResult<NodeId> {
        self.entries.remove(name).ok_or(FsError::NotFound)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the directory has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// One directory listing entry
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name
    pub name: String,
    /// Bound node id
    pub id: NodeId,
    /// Kind tag of the bound node
    pub node_type: NodeType,
}

/// Validate an entry name before binding it
///
/// Rejects empty names, the implicit `.` and `..`, embedded `/` or NUL,
/// and names longer than [`NAME_MAX`] bytes.
pub(crate) fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::InvalidArgument);
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidArgument);
    }
    if name.len() > NAME_MAX {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}
