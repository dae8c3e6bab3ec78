//! Image file mapping.

use crate::BLOCK_SIZE;
use std::fs::OpenOptions;
use std::io;
use std::ops::Deref;
use std::ops::DerefMut;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr;
use std::slice;

/// The smallest image that can hold a filesystem: superblock, one block per
/// bitmap and one block of inode table.
const MIN_BLOCKS: u64 = 4;

/// A filesystem image mapped into memory.
///
/// The mapping is shared, so mutations reach the underlying file at the
/// kernel's discretion; [`ImageMap::sync`] forces a writeback. The region is
/// unmapped on drop. The image size is fixed for the lifetime of the
/// mapping.
pub struct ImageMap {
    ptr: *mut u8,
    len: usize,
}

impl ImageMap {
    /// Maps the image file at `path` read/write.
    ///
    /// The file's size must be a positive multiple of the block size and at
    /// least 4 blocks.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image size must be a positive multiple of {BLOCK_SIZE} bytes"),
            ));
        }
        if len < MIN_BLOCKS * BLOCK_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image must be at least {MIN_BLOCKS} blocks large"),
            ));
        }
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len as usize,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            ptr: ptr as *mut u8,
            len: len as usize,
        })
    }

    /// Flushes the mapped region to the underlying file.
    pub fn sync(&self) -> io::Result<()> {
        let ret = unsafe { libc::msync(self.ptr as *mut _, self.len, libc::MS_SYNC) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Deref for ImageMap {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl DerefMut for ImageMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for ImageMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut _, self.len);
        }
    }
}
