//! Path handling for the lazy task runner.
//!
//! Defines distinct path types for the different uses of paths in the runner:
//!
//! - `AbsoluteSystemPath(Buf)`: a path that is absolute and uses the system's
//!   path separator. Used for interacting with the filesystem.
//! - `AnchoredUnixPath(Buf)`: a path that is relative to the workspace root
//!   (or another anchor directory) and always uses `/` as its separator. Used
//!   wherever paths become identifiers: manifest entries, sort keys, task
//!   keys.
//!
//! As in `std::path`, there are `Path` and `PathBuf` variants of each type
//! indicating whether the path is borrowed or owned. Construction goes
//! through validating `new` methods; the unchecked casts are confined to this
//! crate.

mod absolute_system_path;
mod absolute_system_path_buf;
mod anchored_unix_path;
mod anchored_unix_path_buf;

use std::{io, path::PathBuf};

pub use absolute_system_path::AbsoluteSystemPath;
pub use absolute_system_path_buf::AbsoluteSystemPathBuf;
pub use anchored_unix_path::AnchoredUnixPath;
pub use anchored_unix_path_buf::AnchoredUnixPathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path is non-UTF-8: {0}")]
    InvalidUnicode(String),
    #[error("Path is not absolute: {0}")]
    NotAbsolute(PathBuf),
    #[error("Path is not relative: {0}")]
    NotRelative(String),
    #[error("{0} is not a prefix for {1}")]
    PrefixError(String, String),
    #[error("IO Error {0}")]
    IO(#[from] io::Error),
}

impl From<camino::FromPathBufError> for PathError {
    fn from(value: camino::FromPathBufError) -> Self {
        PathError::InvalidUnicode(value.into_path_buf().to_string_lossy().into_owned())
    }
}

impl PathError {
    pub fn is_io_error(&self, kind: io::ErrorKind) -> bool {
        matches!(self, PathError::IO(err) if err.kind() == kind)
    }
}
