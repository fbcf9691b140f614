//! memfs - In-Memory Hierarchical Filesystem
//!
//! A volatile, process-lifetime filesystem: a tree of named nodes
//! (directories, regular files, symlinks, and device placeholders) held
//! entirely in memory behind an explicit mount handle. Features:
//! - O(log N) directory lookups using BTreeMap
//! - Chunked file storage for efficient memory use
//! - Hardlink, symlink, and unbound temporary-file support
//! - SMP-safe with fine-grained locking and a fixed acquisition order
//!   for multi-directory operations
//! - Explicit mount handles; no global mount state
//!
//! ```
//! use memfs::{FileMode, MemFs};
//!
//! let fs = MemFs::mount("mode=0750").unwrap();
//! let root = fs.root();
//! let file = fs.create(&root, "hello.txt", FileMode::new(0o644)).unwrap();
//! fs.write_at(&file, 0, b"hello").unwrap();
//! assert_eq!(fs.lookup(&root, "hello.txt").unwrap().id(), file.id());
//! fs.unmount();
//! ```

pub mod content;
pub mod dir;
pub mod error;
pub mod mount;
pub mod node;
pub mod ops;
pub mod options;
pub mod store;

pub use dir::{DirEntry, DirectoryIndex, NAME_MAX};
pub use error::{FsError, FsResult};
pub use mount::{MemFs, NodeRef, StatFs};
pub use node::{DeviceId, FileMode, NodeId, NodeType, Stat};
pub use options::{MountFlags, MountOpts, DEFAULT_MODE};
