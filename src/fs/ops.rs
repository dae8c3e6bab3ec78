//! Top-level filesystem operations.
//!
//! These are the verbs a host binding maps to the corresponding system
//! calls. Paths are absolute within the filesystem. Like the kernel-facing
//! API they mirror, the mutating operations assume the host has already
//! validated existence and types where noted.

use crate::Error;
use crate::Fs;
use crate::NAME_MAX;
use crate::ROOT_INO;
use crate::dir::DENTRY_SIZE;
use crate::layout::Dentry;
use crate::layout::Timespec;
use crate::path;
use crate::util;
use std::borrow::Cow;

/// File or directory attributes, as reported by [`Fs::getattr`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attr {
    /// The entry's inode number.
    pub ino: u32,
    /// File type and permission bits.
    pub mode: u32,
    /// Number of links.
    pub links: u32,
    /// Size in bytes.
    pub size: u64,
    /// Number of 512-byte sectors used.
    pub blocks: u64,
    /// Last modification time.
    pub mtime: Timespec,
}

/// Filesystem statistics, as reported by [`Fs::statfs`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatFs {
    /// Block size in bytes.
    pub block_size: u32,
    /// Fragment size in bytes; equal to the block size.
    pub fragment_size: u32,
    /// Total number of blocks.
    pub blocks: u64,
    /// Number of free blocks.
    pub blocks_free: u64,
    /// Number of free blocks available to unprivileged users.
    pub blocks_avail: u64,
    /// Number of inodes in use.
    pub files: u64,
    /// Number of free inodes.
    pub files_free: u64,
    /// Number of free inodes available to unprivileged users.
    pub files_avail: u64,
    /// Maximum file name length.
    pub name_max: u32,
}

/// A modification time to apply with [`Fs::utimens`].
#[derive(Clone, Copy, Debug)]
pub enum SetTime {
    /// Use the current time.
    Now,
    /// Leave the time unchanged.
    Omit,
    /// Use the given time.
    Time(Timespec),
}

impl Fs<'_> {
    /// Returns filesystem statistics.
    pub fn statfs(&self) -> StatFs {
        let sb = self.sb();
        StatFs {
            block_size: crate::BLOCK_SIZE as u32,
            fragment_size: crate::BLOCK_SIZE as u32,
            blocks: sb.size / crate::BLOCK_SIZE as u64,
            blocks_free: sb.free_blocks_count as u64,
            blocks_avail: sb.free_blocks_count as u64,
            files: sb.inodes_count as u64,
            files_free: sb.free_inodes_count as u64,
            files_avail: sb.free_inodes_count as u64,
            name_max: NAME_MAX as u32,
        }
    }

    /// Returns the attributes of the file or directory at `path`.
    ///
    /// Permissions are not enforced, so the mode is reported with all
    /// permission bits set.
    pub fn getattr(&self, path: &str) -> Result<Attr, Error> {
        let ino = self.resolve(path)?;
        let inode = self.inode(ino);
        Ok(Attr {
            ino,
            mode: inode.mode | 0o777,
            links: inode.links,
            size: inode.size,
            blocks: inode.blocks * (crate::BLOCK_SIZE as u64 / 512),
            mtime: inode.mtime,
        })
    }

    /// Lists the directory at `path`, passing each entry name to `filler`.
    ///
    /// `.` and `..` are emitted before the stored entries. When `filler`
    /// returns `false` the listing stops with [`Error::NoMemory`].
    pub fn readdir(&self, path: &str, mut filler: impl FnMut(&str) -> bool) -> Result<(), Error> {
        let ino = self.resolve(path)?;
        if !self.inode(ino).is_dir() {
            return Err(Error::NotDir);
        }
        if !filler(".") || !filler("..") {
            return Err(Error::NoMemory);
        }
        let complete = self.dir_for_each(ino, |_, name| {
            let name: Cow<'_, str> = String::from_utf8_lossy(name);
            filler(&name)
        });
        if !complete {
            return Err(Error::NoMemory);
        }
        Ok(())
    }

    /// Creates a directory at `path`.
    ///
    /// Assumes `path` does not exist yet while its parent does.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        self.make_node(path, mode | libc::S_IFDIR)
    }

    /// Creates a regular file at `path`.
    ///
    /// Assumes `path` does not exist yet while its parent does.
    pub fn create(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        self.make_node(path, mode | libc::S_IFREG)
    }

    fn make_node(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        let is_dir = mode & libc::S_IFMT == libc::S_IFDIR;
        let (parent_path, name) = path::split_parent(path);
        let parent = self.resolve(parent_path)?;
        if !self.inode(parent).is_dir() {
            return Err(Error::NotDir);
        }
        let offset = self.append(parent, DENTRY_SIZE)?;
        let ino = match self.alloc_inode() {
            Ok(ino) => ino,
            Err(e) => {
                // Take the freshly appended entry out again so the failed
                // operation leaves no trace.
                self.splice_out(parent, offset, DENTRY_SIZE);
                return Err(e);
            }
        };
        let entry = Dentry::new(ino, name);
        self.write_at(parent, offset, entry.as_bytes());
        let inode = self.inode_mut(ino);
        inode.mode = mode;
        inode.links = if is_dir { 2 } else { 1 };
        inode.mtime = util::timestamp();
        if is_dir {
            // The child's `..` references the parent.
            self.inode_mut(parent).links += 1;
        }
        self.update_times(path);
        Ok(())
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<(), Error> {
        let ino = self.resolve(path)?;
        if !self.inode(ino).is_dir() {
            return Err(Error::NotDir);
        }
        if self.inode(ino).size != 0 {
            return Err(Error::NotEmpty);
        }
        let (parent_path, name) = path::split_parent(path);
        let parent = self.resolve(parent_path)?;
        let (index, _) = self
            .dir_lookup(parent, name.as_bytes())
            .ok_or(Error::NotFound)?;
        self.free_inode(ino);
        self.dir_remove(parent, index);
        self.inode_mut(parent).links -= 1;
        self.update_times(parent_path);
        Ok(())
    }

    /// Removes the regular file at `path`.
    pub fn unlink(&mut self, path: &str) -> Result<(), Error> {
        let ino = self.resolve(path)?;
        if self.inode(ino).is_dir() {
            return Err(Error::IsDir);
        }
        let (parent_path, name) = path::split_parent(path);
        let parent = self.resolve(parent_path)?;
        let (index, _) = self
            .dir_lookup(parent, name.as_bytes())
            .ok_or(Error::NotFound)?;
        // Release the data first so the block bitmap keeps matching the set
        // of reachable extents.
        self.resize(ino, 0)?;
        self.free_inode(ino);
        self.dir_remove(parent, index);
        self.update_times(parent_path);
        Ok(())
    }

    /// Moves `from` to `to`, replacing an existing target.
    ///
    /// A target directory is only replaced when empty; a target file is
    /// always replaced and its data released.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), Error> {
        let ino = self.resolve(from)?;
        let (from_parent_path, from_name) = path::split_parent(from);
        let from_parent = self.resolve(from_parent_path)?;
        let (to_parent_path, to_name) = path::split_parent(to);
        let to_parent = self.resolve(to_parent_path)?;
        if !self.inode(to_parent).is_dir() {
            return Err(Error::NotDir);
        }
        if let Some((target_index, target)) = self.dir_lookup(to_parent, to_name.as_bytes()) {
            if target == ino {
                return Ok(());
            }
            let target_is_dir = self.inode(target).is_dir();
            if target_is_dir {
                if self.inode(target).size != 0 {
                    return Err(Error::NotEmpty);
                }
            } else {
                self.resize(target, 0)?;
            }
            self.free_inode(target);
            self.dir_remove(to_parent, target_index);
            if target_is_dir {
                self.inode_mut(to_parent).links -= 1;
            }
        }
        let moved_is_dir = self.inode(ino).is_dir();
        if from_parent == to_parent {
            // Same directory: only the entry's name changes.
            let (index, _) = self
                .dir_lookup(from_parent, from_name.as_bytes())
                .ok_or(Error::NotFound)?;
            self.dir_set_name(from_parent, index, to_name);
        } else {
            self.dir_insert(to_parent, to_name, ino)?;
            let (index, _) = self
                .dir_lookup(from_parent, from_name.as_bytes())
                .ok_or(Error::NotFound)?;
            self.dir_remove(from_parent, index);
            if moved_is_dir {
                // The moved directory's `..` now references the new parent.
                self.inode_mut(from_parent).links -= 1;
                self.inode_mut(to_parent).links += 1;
            }
        }
        self.update_times(from_parent_path);
        self.update_times(to);
        Ok(())
    }

    /// Sets the modification time of `path`.
    pub fn utimens(&mut self, path: &str, mtime: SetTime) -> Result<(), Error> {
        let ino = self.resolve(path)?;
        match mtime {
            SetTime::Now => self.inode_mut(ino).mtime = util::timestamp(),
            SetTime::Omit => {}
            SetTime::Time(t) => self.inode_mut(ino).mtime = t,
        }
        Ok(())
    }

    /// Resizes the regular file at `path` to `new_size` bytes.
    ///
    /// Extending reads back as zeros.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> Result<(), Error> {
        let ino = self.resolve(path)?;
        if self.inode(ino).is_dir() {
            return Err(Error::IsDir);
        }
        self.resize(ino, new_size)?;
        self.update_times(path);
        Ok(())
    }

    /// Reads from the file at `path` starting at byte `offset`.
    ///
    /// Returns the number of bytes read: as many as requested unless the
    /// range crosses the end of file, in which case the rest of `buf` is
    /// zero filled. An offset past the end of file reads nothing.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        let ino = self.resolve(path)?;
        let size = self.inode(ino).size;
        if offset > size {
            return Ok(0);
        }
        let count = buf.len().min((size - offset) as usize);
        self.read_at(ino, offset, &mut buf[..count]);
        buf[count..].fill(0);
        Ok(count)
    }

    /// Writes `buf` to the file at `path` starting at byte `offset`,
    /// extending the file as needed. A write past the end of file zero
    /// fills the gap.
    ///
    /// Returns the number of bytes written, always `buf.len()` on success.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize, Error> {
        let ino = self.resolve(path)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset + buf.len() as u64;
        if end > self.inode(ino).size {
            self.resize(ino, end)?;
        }
        self.write_at(ino, offset, buf);
        self.update_times(path);
        Ok(buf.len())
    }

    /// Stamps the current time on every inode along `path`, starting at the
    /// root. A parent directory's modification is considered observed by
    /// all of its ancestors.
    fn update_times(&mut self, path: &str) {
        let now = util::timestamp();
        self.inode_mut(ROOT_INO).mtime = now;
        let mut cur = ROOT_INO;
        for component in path::components(path) {
            match self.dir_lookup(cur, component.as_bytes()) {
                Some((_, ino)) => {
                    cur = ino;
                    self.inode_mut(cur).mtime = now;
                }
                None => break,
            }
        }
    }
}
