//! File Content and Symlink Targets
//!
//! Regular-file bytes are stored in fixed-size zero-filled chunks so
//! large files avoid one giant reallocation. Reads past end-of-content
//! return zero bytes rather than an error; writes and upward truncation
//! grow the chunk list eagerly and charge the mount byte budget before
//! any mutation, so a failed grow leaves the file untouched.

use std::sync::atomic::Ordering;

use crate::error::{FsError, FsResult};
use crate::node::{Node, NodeKind};
use crate::store::ByteBudget;

/// Chunk size for file content (32 KiB)
const CHUNK_SIZE: usize = 32 * 1024;

/// Chunked byte container backing one regular file
pub struct FileContent {
    /// Zero-filled chunks of `CHUNK_SIZE` bytes each
    chunks: Vec<Vec<u8>>,
}

impl FileContent {
    pub(crate) fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Bytes charged against the budget for this content
    pub(crate) fn charged_bytes(&self) -> u64 {
        (self.chunks.len() * CHUNK_SIZE) as u64
    }

    /// Chunks required to cover `size` bytes
    fn chunks_for(size: u64) -> usize {
        ((size + CHUNK_SIZE as u64 - 1) / CHUNK_SIZE as u64) as usize
    }

    /// Grow to cover `size` bytes, charging the budget first
    fn grow_to(&mut self, size: u64, budget: &ByteBudget) -> FsResult<()> {
        let needed = Self::chunks_for(size);
        if needed > self.chunks.len() {
            budget.charge(((needed - self.chunks.len()) * CHUNK_SIZE) as u64)?;
            while self.chunks.len() < needed {
                self.chunks.push(vec![0u8; CHUNK_SIZE]);
            }
        }
        Ok(())
    }
}

impl Node {
    /// Read content at an offset into `dst`, returning the byte count.
    /// Reads at or past end-of-content return 0.
    pub(crate) fn read_at(&self, off: u64, dst: &mut [u8]) -> FsResult<usize> {
        let data = self.data.lock();
        let content = match &data.kind {
            NodeKind::File(content) => content,
            _ => return Err(FsError::InvalidArgument),
        };

        let size = self.size.load(Ordering::Relaxed);
        if off >= size {
            return Ok(0);
        }
        let available = (size - off) as usize;
        let to_read = dst.len().min(available);

        let mut bytes_read = 0;
        let mut current_off = off;
        while bytes_read < to_read {
            let chunk_idx = (current_off / CHUNK_SIZE as u64) as usize;
            let chunk_off = (current_off % CHUNK_SIZE as u64) as usize;
            if chunk_idx >= content.chunks.len() {
                break;
            }
            let chunk = &content.chunks[chunk_idx];
            let to_copy = (to_read - bytes_read).min(CHUNK_SIZE - chunk_off);
            dst[bytes_read..bytes_read + to_copy]
                .copy_from_slice(&chunk[chunk_off..chunk_off + to_copy]);
            bytes_read += to_copy;
            current_off += to_copy as u64;
        }

        Ok(bytes_read)
    }

    /// Write `src` at an offset, growing the file as needed.
    pub(crate) fn write_at(&self, off: u64, src: &[u8], budget: &ByteBudget) -> FsResult<usize> {
        let mut data = self.data.lock();
        let content = match &mut data.kind {
            NodeKind::File(content) => content,
            _ => return Err(FsError::InvalidArgument),
        };

        let end = off
            .checked_add(src.len() as u64)
            .ok_or(FsError::InvalidArgument)?;
        content.grow_to(end, budget)?;

        let mut bytes_written = 0;
        let mut current_off = off;
        while bytes_written < src.len() {
            let chunk_idx = (current_off / CHUNK_SIZE as u64) as usize;
            let chunk_off = (current_off % CHUNK_SIZE as u64) as usize;
            let to_copy = (src.len() - bytes_written).min(CHUNK_SIZE - chunk_off);
            content.chunks[chunk_idx][chunk_off..chunk_off + to_copy]
                .copy_from_slice(&src[bytes_written..bytes_written + to_copy]);
            bytes_written += to_copy;
            current_off += to_copy as u64;
        }

        let old_size = self.size.load(Ordering::Relaxed);
        self.size.store(end.max(old_size), Ordering::Relaxed);
        data.touch();

        Ok(bytes_written)
    }

    /// Truncate content to `new_size`, zero-filling on growth.
    pub(crate) fn truncate_content(&self, new_size: u64, budget: &ByteBudget) -> FsResult<()> {
        let mut data = self.data.lock();
        let content = match &mut data.kind {
            NodeKind::File(content) => content,
            _ => return Err(FsError::InvalidArgument),
        };

        let old_size = self.size.load(Ordering::Relaxed);
        if new_size < old_size {
            let keep = FileContent::chunks_for(new_size);
            let freed = content.chunks.len().saturating_sub(keep);
            content.chunks.truncate(keep);
            budget.release((freed * CHUNK_SIZE) as u64);
            // Zero the tail of the last kept chunk so a later grow does
            // not resurrect truncated bytes.
            let tail_off = (new_size % CHUNK_SIZE as u64) as usize;
            if tail_off > 0 && keep > 0 {
                content.chunks[keep - 1][tail_off..].fill(0);
            }
        } else if new_size > old_size {
            content.grow_to(new_size, budget)?;
        }

        self.size.store(new_size, Ordering::Relaxed);
        data.touch();

        Ok(())
    }

    /// Read the target of a symlink
    pub(crate) fn readlink(&self) -> FsResult<String> {
        let data = self.data.lock();
        match &data.kind {
            NodeKind::Symlink(target) => Ok(target.clone()),
            _ => Err(FsError::InvalidArgument),
        }
    }
}
