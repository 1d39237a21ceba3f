//! The on-disk input manifest: the canonical, line-oriented record of a
//! task's fingerprinted inputs.
//!
//! A manifest holds one entry per input, totally ordered by
//! `(type rank, id)`, serialized one per line as
//! `type\tid\thash[\tmetadata]\n`. The aggregate hash over the entries is
//! the task's cache key: if it matches the previous run's, the task's
//! outputs are still valid and the task is skipped.
//!
//! Layout under a package directory:
//!
//! ```text
//! .lazy/manifests/<slug(task)>        current manifest
//! .lazy/manifests/<slug(task)>.next   transient while writing
//! .lazy/diffs/<slug(task)>            human-readable diff from the last miss
//! ```

mod builder;
mod diff;
mod entry;
mod read;

use lazypath::{AbsoluteSystemPath, AbsoluteSystemPathBuf};

pub use builder::{ManifestBuilder, ManifestSummary};
pub use diff::diff_entries;
pub use entry::{EntryType, ManifestEntry};
pub use read::{read_manifest, PreviousManifest};

pub const LAZY_DIR: &str = ".lazy";
pub const MANIFESTS_DIR: &str = "manifests";
pub const DIFFS_DIR: &str = "diffs";
const NEXT_SUFFIX: &str = ".next";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed manifest line in {path}: {line:?}")]
    MalformedLine { path: String, line: String },
    #[error("unknown manifest entry type {found:?} in {path}")]
    UnknownEntryType { path: String, found: String },
    #[error(
        "manifest entries supplied out of order: {next} after {last} (this is a bug in the runner)"
    )]
    OutOfOrder { last: String, next: String },
    #[error("manifest field may not contain tabs or newlines: {0:?}")]
    InvalidField(String),
    #[error("unable to write manifest {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Filename-safe encoding of a task name. Bytes outside `[a-z0-9._-]` are
/// percent-encoded, which keeps the mapping injective: distinct task names
/// can never collide on disk. Uppercase letters are percent-encoded rather
/// than folded to lowercase on purpose: folding would collide `Build` with
/// `build`, and collision-freedom wins over producing a literally lowercased
/// name. Real-world task names are all-lowercase and pass through verbatim.
pub fn slug(task_name: &str) -> String {
    let mut out = String::with_capacity(task_name.len());
    for byte in task_name.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02x}")),
        }
    }
    out
}

pub fn manifest_path(state_root: &AbsoluteSystemPath, task_name: &str) -> AbsoluteSystemPathBuf {
    let slug = slug(task_name);
    state_root.join_components(&[LAZY_DIR, MANIFESTS_DIR, slug.as_str()])
}

pub fn next_manifest_path(
    state_root: &AbsoluteSystemPath,
    task_name: &str,
) -> AbsoluteSystemPathBuf {
    let file_name = format!("{}{NEXT_SUFFIX}", slug(task_name));
    state_root.join_components(&[LAZY_DIR, MANIFESTS_DIR, file_name.as_str()])
}

pub fn diff_path(state_root: &AbsoluteSystemPath, task_name: &str) -> AbsoluteSystemPathBuf {
    let slug = slug(task_name);
    state_root.join_components(&[LAZY_DIR, DIFFS_DIR, slug.as_str()])
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;

    #[test_case("build", "build")]
    #[test_case("build:watch", "build%3awatch")]
    #[test_case("Build", "%42uild")]
    #[test_case("test.unit", "test.unit")]
    fn test_slug(input: &str, expected: &str) {
        assert_eq!(slug(input), expected);
    }

    #[test]
    fn test_slug_is_injective_for_case_variants() {
        assert_ne!(slug("Build"), slug("build"));
    }
}
