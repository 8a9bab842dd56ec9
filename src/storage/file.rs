//! Fixed-block record files.
//!
//! Each store file is a flat sequence of fixed-size blocks. A record's
//! address is its byte offset, so every valid address is a multiple of the
//! block size; that invariant is checked on every access and a mismatch is a
//! fatal format error.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::OpenMode;
use crate::error::{Result, StoreError};
use crate::primitives::io::{FileIo, StdFileIo};
use crate::types::BlockAddr;

/// A flat file of fixed-size records addressed by byte offset.
///
/// Allocation is append-only; records are mutated in place and never moved,
/// so an address stays valid for the lifetime of the store. Stores whose
/// addresses participate in linked lists reserve a zeroed guard block at
/// offset 0 so that address 0 can serve as the list terminator.
pub struct RecordFile {
    io: StdFileIo,
    path: PathBuf,
    block_size: u32,
    tail: Mutex<u32>,
}

impl fmt::Debug for RecordFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordFile")
            .field("path", &self.path)
            .field("block_size", &self.block_size)
            .field("tail", &self.tail())
            .finish()
    }
}

impl RecordFile {
    /// Opens or creates the record file at `path`.
    ///
    /// With [`OpenMode::Create`] the file is truncated and, if
    /// `reserve_guard` is set, a zeroed guard block is written at offset 0.
    /// With [`OpenMode::Reopen`] the existing length must be a whole number
    /// of blocks.
    pub fn open(
        path: impl AsRef<Path>,
        block_size: usize,
        mode: OpenMode,
        reserve_guard: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let block_size = u32::try_from(block_size)
            .map_err(|_| StoreError::InvalidArgument("block size exceeds u32::MAX".into()))?;
        if block_size == 0 {
            return Err(StoreError::InvalidArgument("block size must be non-zero".into()));
        }
        let io = StdFileIo::open(&path)?;
        let tail = match mode {
            OpenMode::Create => {
                io.truncate(0)?;
                if reserve_guard {
                    io.write_at(0, &vec![0u8; block_size as usize])?;
                    block_size
                } else {
                    0
                }
            }
            OpenMode::Reopen => {
                let len = io.len()?;
                if len % u64::from(block_size) != 0 {
                    return Err(StoreError::Corruption(format!(
                        "{} length {len} is not a multiple of block size {block_size}",
                        path.display()
                    )));
                }
                u32::try_from(len).map_err(|_| {
                    StoreError::Corruption(format!(
                        "{} exceeds the 4 GiB addressable range",
                        path.display()
                    ))
                })?
            }
        };
        debug!(path = %path.display(), block_size, tail, "opened record file");
        Ok(Self {
            io,
            path,
            block_size,
            tail: Mutex::new(tail),
        })
    }

    /// The fixed block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Current end of the allocated region, in bytes.
    pub fn tail(&self) -> u32 {
        *self.tail.lock()
    }

    /// Allocates the next free block and returns its address.
    ///
    /// The block's bytes are not written here; callers persist the record
    /// before publishing its address anywhere.
    pub fn alloc(&self) -> Result<BlockAddr> {
        let mut tail = self.tail.lock();
        let addr = *tail;
        let next = tail.checked_add(self.block_size).ok_or_else(|| {
            StoreError::Allocation(format!(
                "{} reached the 4 GiB addressable limit",
                self.path.display()
            ))
        })?;
        *tail = next;
        Ok(BlockAddr(addr))
    }

    fn check_addr(&self, addr: BlockAddr) -> Result<()> {
        if addr.0 % self.block_size != 0 {
            return Err(StoreError::Corruption(format!(
                "address {addr} in {} is not aligned to block size {}",
                self.path.display(),
                self.block_size
            )));
        }
        if addr.0 >= self.tail() {
            return Err(StoreError::Corruption(format!(
                "address {addr} in {} is past the allocated region",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Reads one whole block.
    pub fn read_block(&self, addr: BlockAddr) -> Result<Vec<u8>> {
        self.check_addr(addr)?;
        let mut buf = vec![0u8; self.block_size as usize];
        self.io.read_at(addr.offset(), &mut buf)?;
        Ok(buf)
    }

    /// Writes one whole block. The write is unbuffered, so it is visible to
    /// subsequent readers as soon as this returns.
    pub fn write_block(&self, addr: BlockAddr, bytes: &[u8]) -> Result<()> {
        self.check_addr(addr)?;
        if bytes.len() != self.block_size as usize {
            return Err(StoreError::InvalidArgument(format!(
                "block write of {} bytes against block size {}",
                bytes.len(),
                self.block_size
            )));
        }
        self.io
            .write_at(addr.offset(), bytes)
            .map_err(|e| self.allocation_if_io(e))
    }

    /// Writes a single field inside a block at its known offset.
    pub fn write_field(&self, addr: BlockAddr, field_offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_addr(addr)?;
        if field_offset + bytes.len() > self.block_size as usize {
            return Err(StoreError::InvalidArgument(format!(
                "field write at {field_offset}+{} overruns block size {}",
                bytes.len(),
                self.block_size
            )));
        }
        self.io.write_at(addr.offset() + field_offset as u64, bytes)
    }

    /// Forces all written data to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.io.sync_all()
    }

    /// Record writes are the append path: a block is written in full once,
    /// right after [`Self::alloc`], so a failed write means the file could
    /// not grow. Field rewrites of already-written blocks stay plain I/O
    /// errors.
    fn allocation_if_io(&self, err: StoreError) -> StoreError {
        match err {
            StoreError::Io(inner) => StoreError::Allocation(format!(
                "{}: {inner}",
                self.path.display()
            )),
            other => other,
        }
    }
}
