//! Directory entry management.
//!
//! A directory stores its children as a dense array of fixed-size
//! [`Dentry`] records in its own file data; the record size divides the
//! block size, so a record never straddles an extent boundary. Lookup is a
//! linear scan, insertion appends and removal splices the array.

use crate::Error;
use crate::Fs;
use crate::NAME_MAX;
use crate::layout::Dentry;
use std::mem::size_of;

/// Size of a directory entry record in bytes.
pub(crate) const DENTRY_SIZE: u64 = size_of::<Dentry>() as u64;

impl Fs<'_> {
    /// Looks `name` up in directory `dir` and returns the entry's position
    /// in the array along with the referenced inode number.
    pub(crate) fn dir_lookup(&self, dir: u32, name: &[u8]) -> Option<(u32, u32)> {
        let size = self.inode(dir).size;
        let mut index = 0;
        for (start, len) in self.segments(dir, 0, size) {
            for record in self.bytes(start, len).chunks_exact(DENTRY_SIZE as usize) {
                let entry = Fs::dentry_at(record);
                if entry.name() == name {
                    return Some((index, entry.ino));
                }
                index += 1;
            }
        }
        None
    }

    /// Appends an entry for inode `ino` named `name` to directory `dir`.
    ///
    /// The name is truncated to `NAME_MAX - 1` bytes. Fails with
    /// [`Error::NoSpace`] when the directory cannot grow.
    pub(crate) fn dir_insert(&mut self, dir: u32, name: &str, ino: u32) -> Result<(), Error> {
        let offset = self.append(dir, DENTRY_SIZE)?;
        let entry = Dentry::new(ino, name);
        self.write_at(dir, offset, entry.as_bytes());
        Ok(())
    }

    /// Removes the entry at position `index` from directory `dir`.
    pub(crate) fn dir_remove(&mut self, dir: u32, index: u32) {
        self.splice_out(dir, index as u64 * DENTRY_SIZE, DENTRY_SIZE);
    }

    /// Rewrites the name of the entry at position `index` of directory
    /// `dir`, truncated to `NAME_MAX - 1` bytes.
    pub(crate) fn dir_set_name(&mut self, dir: u32, index: u32, name: &str) {
        let mut padded = [0u8; NAME_MAX];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_MAX - 1);
        padded[..len].copy_from_slice(&bytes[..len]);
        let offset = index as u64 * DENTRY_SIZE + std::mem::offset_of!(Dentry, name) as u64;
        self.write_at(dir, offset, &padded);
    }

    /// Calls `f` with the inode number and name of every entry of directory
    /// `dir`, in array order, until `f` returns `false`.
    ///
    /// Returns whether the iteration ran to completion.
    pub(crate) fn dir_for_each(&self, dir: u32, mut f: impl FnMut(u32, &[u8]) -> bool) -> bool {
        let size = self.inode(dir).size;
        for (start, len) in self.segments(dir, 0, size) {
            for record in self.bytes(start, len).chunks_exact(DENTRY_SIZE as usize) {
                let entry = Fs::dentry_at(record);
                if !f(entry.ino, entry.name()) {
                    return false;
                }
            }
        }
        true
    }
}
