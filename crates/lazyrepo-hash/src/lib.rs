//! Content hashing for the lazy task runner.
//!
//! Everything that feeds a cache decision — file contents, env var values,
//! and the rolling manifest aggregate — goes through the same SHA-256
//! digest, hex encoded. File hashing streams through a fixed buffer so large
//! artifacts never get pulled into memory whole.

use std::io::Read;

use lazypath::AbsoluteSystemPath;
use sha2::{Digest, Sha256};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to hash file {path}: {source}")]
    FileHash {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Path(#[from] lazypath::PathError),
}

pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

pub fn hash_string(value: impl AsRef<str>) -> String {
    hash_bytes(value.as_ref().as_bytes())
}

/// Hashes the contents of `path`, streaming so that file size doesn't matter.
pub fn hash_file(path: &AbsoluteSystemPath) -> Result<String, Error> {
    let mut file = path.open()?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer).map_err(|source| Error::FileHash {
            path: path.to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Incremental hasher for the manifest aggregate: fed the serialized lines
/// in canonical order, finished once.
#[derive(Default)]
pub struct AggregateHasher {
    inner: Sha256,
}

impl AggregateHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: impl AsRef<[u8]>) {
        self.inner.update(bytes.as_ref());
    }

    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
