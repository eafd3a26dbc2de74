//! Shared-memory position channel.
//!
//! The producer owns the page and overwrites its slots in place; this side
//! only reads. There is no cross-process lock: a slot is trusted only when
//! its trailing newline sentinel is present.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use anyhow::{bail, Context, Result};
use gpmwatch_core::position::{
    decode_click_record, decode_position_slot, ClickRecord, Position, CLICK_RECORD_MAX_LEN,
    CLICK_RECORD_OFFSET, POSITION_SLOT_LEN,
};
use tracing::{debug, warn};

/// Read access to the producer's latest position and click record.
///
/// Implemented by [`SharedChannel`]; the event loop and signal listeners are
/// written against this trait so they can run on an in-memory fake.
pub trait PositionSource: Send + Sync {
    /// Latest complete position, or `None` if the slot is mid-write.
    fn read_position(&self) -> Option<Position>;

    /// Latest complete click record, if any.
    fn read_click_record(&self) -> Option<ClickRecord> {
        None
    }
}

/// A page-sized shared mapping of the producer's channel file.
///
/// The mapping is released in `Drop`, then the file descriptor closes.
pub struct SharedChannel {
    ptr: NonNull<u8>,
    len: usize,
    path: PathBuf,
    /// Keeps the descriptor open for the lifetime of the mapping.
    _file: File,
}

// SAFETY: the mapping is never written from this process and every read is
// a volatile byte copy, so sharing the pointer across threads cannot
// create a data race on the Rust side. Concurrent writes come from another
// process and are covered by the sentinel check.
unsafe impl Send for SharedChannel {}
unsafe impl Sync for SharedChannel {}

impl SharedChannel {
    /// Open and map the channel file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .with_context(|| format!("Failed to open shm file: {:?}", path))?;

        let file_len = file
            .metadata()
            .with_context(|| format!("Failed to stat shm file: {:?}", path))?
            .len();
        if file_len == 0 {
            bail!("shm file {:?} is empty", path);
        }

        let len = page_size()?;

        // SAFETY: mapping a valid, open descriptor with a null hint and a
        // non-zero length. The result is checked against MAP_FAILED below.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("Failed to mmap shm file: {:?}", path));
        }
        let ptr = NonNull::new(addr as *mut u8).context("mmap returned a null mapping")?;

        debug!("Mapped {} bytes of {:?}", len, path);

        Ok(Self {
            ptr,
            len,
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `out.len()` bytes starting at `offset`, clamped to the mapping.
    fn read_bytes(&self, offset: usize, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len.saturating_sub(offset));
        for (i, byte) in out[..n].iter_mut().enumerate() {
            // SAFETY: offset + i < self.len, inside the live mapping.
            *byte = unsafe { std::ptr::read_volatile(self.ptr.as_ptr().add(offset + i)) };
        }
        n
    }
}

impl PositionSource for SharedChannel {
    fn read_position(&self) -> Option<Position> {
        let mut slot = [0u8; POSITION_SLOT_LEN];
        let n = self.read_bytes(0, &mut slot);
        let pos = decode_position_slot(&slot[..n]);
        if pos.is_none() {
            debug!("Position slot incomplete, skipping: {:?}", String::from_utf8_lossy(&slot[..n]));
        }
        pos
    }

    fn read_click_record(&self) -> Option<ClickRecord> {
        let mut buf = [0u8; CLICK_RECORD_MAX_LEN];
        let n = self.read_bytes(CLICK_RECORD_OFFSET, &mut buf);
        decode_click_record(&buf[..n])
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        // SAFETY: ptr/len are exactly what mmap returned and nothing borrows
        // the mapping past this point.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            warn!(
                "Failed to unmap shm file {:?}: {}",
                self.path,
                std::io::Error::last_os_error()
            );
        }
    }
}

/// System page size, the size of the producer's channel.
fn page_size() -> Result<usize> {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        bail!("Failed to read page size: {}", std::io::Error::last_os_error());
    }
    Ok(size as usize)
}
