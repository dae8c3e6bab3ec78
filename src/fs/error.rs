//! Operation errors.

use thiserror::Error;

/// An error returned by a filesystem operation.
///
/// Each kind maps to an errno value through [`Error::errno`]; host bindings
/// return the negated value to the kernel.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The path or one of its components is too long.
    #[error("file name too long")]
    NameTooLong,
    /// A component of the path does not exist.
    #[error("no such file or directory")]
    NotFound,
    /// A component of the path prefix is not a directory.
    #[error("not a directory")]
    NotDir,
    /// The target is a directory.
    #[error("is a directory")]
    IsDir,
    /// The directory is not empty.
    #[error("directory not empty")]
    NotEmpty,
    /// No free inode or block is left, or the per-file extent limit was hit.
    #[error("no space left on device")]
    NoSpace,
    /// The host refused a directory listing callback.
    #[error("cannot allocate memory")]
    NoMemory,
    /// The image does not contain a valid filesystem.
    #[error("invalid filesystem image")]
    InvalidImage,
}

impl Error {
    /// Returns the errno value for this error.
    pub fn errno(self) -> i32 {
        match self {
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::NotFound => libc::ENOENT,
            Self::NotDir => libc::ENOTDIR,
            Self::IsDir => libc::EISDIR,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::NoSpace => libc::ENOSPC,
            Self::NoMemory => libc::ENOMEM,
            Self::InvalidImage => libc::EIO,
        }
    }
}
