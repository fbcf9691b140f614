//! Mount Options
//!
//! Textual option strings are comma-separated `key=value` pairs. The one
//! recognized key is `mode`, an octal permission value for the root
//! directory. Malformed values for recognized keys are parse errors.

use bitflags::bitflags;

use crate::error::{FsError, FsResult};
use crate::node::FileMode;

/// Default root directory permissions
pub const DEFAULT_MODE: u16 = 0o755;

/// Default memory budget for one mount (1 GiB)
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024 * 1024;

bitflags! {
    /// Mount flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MountFlags: u32 {
        /// Reject every mutating operation with `ReadOnly`
        const READ_ONLY = 1 << 0;
    }
}

/// Resolved per-mount configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOpts {
    /// Root directory permission bits
    pub mode: FileMode,
    /// Mount flags
    pub flags: MountFlags,
    /// Memory budget in bytes; 0 means unlimited
    pub max_bytes: u64,
}

impl Default for MountOpts {
    fn default() -> Self {
        Self {
            mode: FileMode::new(DEFAULT_MODE),
            flags: MountFlags::empty(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl MountOpts {
    /// Parse an option string.
    ///
    /// Unrecognized keys are deliberately ignored rather than rejected:
    /// generic mount tooling passes options this filesystem never
    /// handled, and rejecting them would break historically-working
    /// invocations.
    pub fn parse(options: &str) -> FsResult<Self> {
        let mut opts = Self::default();
        for token in options.split(',') {
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some(("mode", value)) => {
                    let bits =
                        u16::from_str_radix(value, 8).map_err(|_| FsError::ParseError)?;
                    opts.mode = FileMode::new(bits & FileMode::PERM_MASK);
                }
                _ => {}
            }
        }
        Ok(opts)
    }

    /// Mark this mount read-only
    pub fn read_only(mut self) -> Self {
        self.flags |= MountFlags::READ_ONLY;
        self
    }

    /// Render the options that diverge from the compiled-in defaults,
    /// in mount-table format.
    pub fn show(&self) -> String {
        if self.mode.permissions() != DEFAULT_MODE {
            format!(",mode={:o}", self.mode.permissions())
        } else {
            String::new()
        }
    }
}
