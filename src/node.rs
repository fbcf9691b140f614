//! Node Types and Metadata
//!
//! Every filesystem object is a `Node`: a process-unique id, an immutable
//! kind tag, atomic link/size/handle counters, and a lock-protected
//! metadata block whose payload is a sum type over the four node kinds.
//! Only directories carry a name index, only files carry content, only
//! symlinks carry a target, and only specials carry device numbers, so
//! invalid combinations are unrepresentable.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use spin::Mutex;

use crate::content::FileContent;
use crate::dir::DirectoryIndex;
use crate::error::{FsError, FsResult};

/// Process-unique node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// File mode bits following POSIX conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct FileMode(pub u16);

impl FileMode {
    pub const S_IFMT: u16 = 0o170000; // File type mask
    pub const S_IFREG: u16 = 0o100000; // Regular file
    pub const S_IFDIR: u16 = 0o040000; // Directory
    pub const S_IFLNK: u16 = 0o120000; // Symbolic link
    pub const S_IFCHR: u16 = 0o020000; // Character device
    pub const S_IFBLK: u16 = 0o060000; // Block device
    pub const S_IFIFO: u16 = 0o010000; // FIFO
    pub const S_IFSOCK: u16 = 0o140000; // Socket

    /// Permission bits, including setuid/setgid/sticky
    pub const PERM_MASK: u16 = 0o7777;

    /// Create a new FileMode
    pub const fn new(mode: u16) -> Self {
        Self(mode)
    }

    /// Get the file type bits
    pub const fn file_type(&self) -> u16 {
        self.0 & Self::S_IFMT
    }

    /// Get the permission bits
    pub const fn permissions(&self) -> u16 {
        self.0 & Self::PERM_MASK
    }

    /// Check if this is a regular file
    pub const fn is_regular(&self) -> bool {
        self.file_type() == Self::S_IFREG
    }

    /// Check if this is a directory
    pub const fn is_directory(&self) -> bool {
        self.file_type() == Self::S_IFDIR
    }

    /// Check if this is a symbolic link
    pub const fn is_symlink(&self) -> bool {
        self.file_type() == Self::S_IFLNK
    }

    /// Map the type bits to a node kind tag. Anything that is not a
    /// regular file, directory, or symlink is a device-style special node.
    pub const fn node_type(&self) -> NodeType {
        match self.file_type() {
            Self::S_IFDIR => NodeType::Directory,
            Self::S_IFREG => NodeType::File,
            Self::S_IFLNK => NodeType::Symlink,
            _ => NodeType::Special,
        }
    }
}

/// Node kind tag, fixed at allocation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Directory,
    File,
    Symlink,
    Special,
}

/// Device major/minor pair carried by special nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

/// Kind-specific payload
pub enum NodeKind {
    Directory(DirectoryIndex),
    File(FileContent),
    Symlink(String),
    Special(DeviceId),
}

/// Node metadata protected by the node lock
pub struct NodeData {
    /// File mode (type and permissions)
    pub mode: FileMode,
    /// User ID
    pub uid: u32,
    /// Group ID
    pub gid: u32,
    /// Access time (Unix timestamp in nanoseconds)
    pub atime: u64,
    /// Modification time
    pub mtime: u64,
    /// Change time
    pub ctime: u64,
    /// Kind-specific payload
    pub kind: NodeKind,
}

impl NodeData {
    /// Borrow the directory index, or fail for non-directories
    pub(crate) fn dir_index(&self) -> FsResult<&DirectoryIndex> {
        match &self.kind {
            NodeKind::Directory(index) => Ok(index),
            _ => Err(FsError::NotADirectory),
        }
    }

    /// Mutably borrow the directory index, or fail for non-directories
    pub(crate) fn dir_index_mut(&mut self) -> FsResult<&mut DirectoryIndex> {
        match &mut self.kind {
            NodeKind::Directory(index) => Ok(index),
            _ => Err(FsError::NotADirectory),
        }
    }

    /// Stamp a structural change on this node (mtime and ctime)
    pub(crate) fn touch(&mut self) {
        let now = unix_now();
        self.mtime = now;
        self.ctime = now;
    }
}

/// A filesystem node
///
/// The counters are atomics so link-count and size updates need no lock;
/// everything else lives behind the `data` lock.
pub struct Node {
    /// Node identifier
    pub(crate) id: NodeId,
    /// Kind tag, immutable for the node's lifetime
    node_type: NodeType,
    /// Number of directory bindings keeping this node reachable
    pub(crate) nlink: AtomicU32,
    /// Content size in bytes
    pub(crate) size: AtomicU64,
    /// Number of open handles (`NodeRef`s) on this node
    pub(crate) handles: AtomicU32,
    /// Metadata and kind-specific payload
    pub(crate) data: Mutex<NodeData>,
}

impl Node {
    /// Create a new directory node. Directories start with two links,
    /// one for the implicit self entry and one for the parent's binding.
    pub(crate) fn new_dir(id: NodeId, mode: FileMode, uid: u32, gid: u32, parent: NodeId) -> Self {
        Self::with_kind(id, mode, uid, gid, 2, NodeKind::Directory(DirectoryIndex::new(parent)))
    }

    /// Create a new regular file node
    pub(crate) fn new_file(id: NodeId, mode: FileMode, uid: u32, gid: u32) -> Self {
        Self::with_kind(id, mode, uid, gid, 1, NodeKind::File(FileContent::new()))
    }

    /// Create a new symlink node. The target is fixed for the node's
    /// lifetime; there is no retarget operation.
    pub(crate) fn new_symlink(id: NodeId, target: String, uid: u32, gid: u32) -> Self {
        let mode = FileMode::new(FileMode::S_IFLNK | 0o777);
        let len = target.len() as u64;
        let node = Self::with_kind(id, mode, uid, gid, 1, NodeKind::Symlink(target));
        node.size.store(len, Ordering::Relaxed);
        node
    }

    /// Create a new special node carrying a device pair
    pub(crate) fn new_special(id: NodeId, mode: FileMode, uid: u32, gid: u32, dev: DeviceId) -> Self {
        Self::with_kind(id, mode, uid, gid, 1, NodeKind::Special(dev))
    }

    fn with_kind(id: NodeId, mode: FileMode, uid: u32, gid: u32, nlink: u32, kind: NodeKind) -> Self {
        let now = unix_now();
        let node_type = match &kind {
            NodeKind::Directory(_) => NodeType::Directory,
            NodeKind::File(_) => NodeType::File,
            NodeKind::Symlink(_) => NodeType::Symlink,
            NodeKind::Special(_) => NodeType::Special,
        };
        Self {
            id,
            node_type,
            nlink: AtomicU32::new(nlink),
            size: AtomicU64::new(0),
            handles: AtomicU32::new(0),
            data: Mutex::new(NodeData {
                mode,
                uid,
                gid,
                atime: now,
                mtime: now,
                ctime: now,
                kind,
            }),
        }
    }

    /// Get the node identifier
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the kind tag. Lock-free: the tag never changes.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Get the number of directory bindings
    pub fn nlink(&self) -> u32 {
        self.nlink.load(Ordering::SeqCst)
    }

    /// Get full metadata for this node
    pub(crate) fn stat(&self) -> Stat {
        let data = self.data.lock();
        Stat {
            ino: self.id.as_u64(),
            node_type: self.node_type,
            mode: data.mode,
            nlink: self.nlink.load(Ordering::SeqCst),
            uid: data.uid,
            gid: data.gid,
            size: self.size.load(Ordering::Relaxed),
            rdev: match &data.kind {
                NodeKind::Special(dev) => Some(*dev),
                _ => None,
            },
            atime: data.atime,
            mtime: data.mtime,
            ctime: data.ctime,
        }
    }

    /// Stamp a link-count change on this node
    pub(crate) fn touch_ctime(&self) {
        self.data.lock().ctime = unix_now();
    }
}

/// Node metadata snapshot
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    /// Node identifier
    pub ino: u64,
    /// Kind tag
    pub node_type: NodeType,
    /// File type and permission bits
    pub mode: FileMode,
    /// Number of directory bindings
    pub nlink: u32,
    /// User ID
    pub uid: u32,
    /// Group ID
    pub gid: u32,
    /// Content size in bytes
    pub size: u64,
    /// Device pair, for special nodes only
    pub rdev: Option<DeviceId>,
    /// Access time (Unix timestamp in nanoseconds)
    pub atime: u64,
    /// Modification time
    pub mtime: u64,
    /// Change time
    pub ctime: u64,
}

/// Current time as a Unix timestamp in nanoseconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
