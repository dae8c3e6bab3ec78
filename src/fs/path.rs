//! Path resolution.

use crate::Error;
use crate::Fs;
use crate::NAME_MAX;
use crate::PATH_MAX;
use crate::ROOT_INO;

/// Splits `path` into the path of its parent directory and the leaf name.
///
/// The parent of a top-level entry is the empty path, which resolves to the
/// root directory.
pub(crate) fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Returns an iterator over the non-empty components of `path`.
pub(crate) fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

impl Fs<'_> {
    /// Resolves `path` to an inode number, starting from the root
    /// directory.
    ///
    /// Errors:
    /// - [`Error::NameTooLong`]: the path or one of its components is too
    ///   long.
    /// - [`Error::NotFound`]: a component of the path does not exist.
    /// - [`Error::NotDir`]: a component of the path prefix is not a
    ///   directory.
    pub(crate) fn resolve(&self, path: &str) -> Result<u32, Error> {
        if path.len() >= PATH_MAX {
            return Err(Error::NameTooLong);
        }
        let mut cur = ROOT_INO;
        for component in components(path) {
            if component.len() >= NAME_MAX {
                return Err(Error::NameTooLong);
            }
            if !self.inode(cur).is_dir() {
                return Err(Error::NotDir);
            }
            let (_, ino) = self
                .dir_lookup(cur, component.as_bytes())
                .ok_or(Error::NotFound)?;
            cur = ino;
        }
        Ok(cur)
    }
}
