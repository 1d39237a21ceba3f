use std::io::{BufWriter, Write};

use lazypath::{AbsoluteSystemPath, AbsoluteSystemPathBuf};
use lazyrepo_hash::AggregateHasher;
use tracing::debug;

use crate::{
    diff_entries, manifest_path, next_manifest_path, read_manifest, diff_path, EntryType, Error,
    ManifestEntry, PreviousManifest,
};

/// Result of finalizing a manifest build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSummary {
    /// False iff the aggregate hash equals the previous manifest's.
    pub did_change: bool,
    /// The aggregate hash; the task's cache key.
    pub hash: String,
    /// Whether a previous manifest existed at all.
    pub had_previous: bool,
}

/// Streaming construction of one task's manifest.
///
/// Entries must be supplied in canonical `(type rank, id)` order; the
/// builder refuses out-of-order input since that indicates a scheduler bug,
/// not bad user data. One builder per task invocation, used from a single
/// caller.
pub struct ManifestBuilder {
    manifest_path: AbsoluteSystemPathBuf,
    next_path: AbsoluteSystemPathBuf,
    diff_path: AbsoluteSystemPathBuf,
    previous: Option<PreviousManifest>,
    writer: BufWriter<std::fs::File>,
    aggregate: AggregateHasher,
    entries: Vec<ManifestEntry>,
}

impl ManifestBuilder {
    /// Opens a builder for `task_name` whose state lives under
    /// `state_root/.lazy/` (the package directory, or the workspace root
    /// for top-level tasks). Reads the previous manifest if one exists and
    /// starts the `.next` file.
    pub fn new(state_root: &AbsoluteSystemPath, task_name: &str) -> Result<Self, Error> {
        let manifest_path = manifest_path(state_root, task_name);
        let next_path = next_manifest_path(state_root, task_name);
        let diff_path = diff_path(state_root, task_name);

        let previous = read_manifest(&manifest_path)?;

        let open = |path: &AbsoluteSystemPath| -> Result<std::fs::File, Error> {
            path.ensure_dir().map_err(|source| Error::Write {
                path: path.to_string(),
                source,
            })?;
            std::fs::File::create(path).map_err(|source| Error::Write {
                path: path.to_string(),
                source,
            })
        };

        let writer = BufWriter::new(open(&next_path)?);

        Ok(Self {
            manifest_path,
            next_path,
            diff_path,
            previous,
            writer,
            aggregate: AggregateHasher::new(),
            entries: Vec::new(),
        })
    }

    pub fn had_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Appends an entry. Canonical ordering against the last entry is
    /// enforced; equal keys are rejected too, which is what makes
    /// "(type, id) appears at most once" hold.
    pub fn update(
        &mut self,
        entry_type: EntryType,
        id: &str,
        hash: &str,
        metadata: Option<&str>,
    ) -> Result<(), Error> {
        for field in [id, hash].into_iter().chain(metadata) {
            if field.contains('\t') || field.contains('\n') {
                return Err(Error::InvalidField(field.to_owned()));
            }
        }

        let entry = ManifestEntry {
            entry_type,
            id: id.to_owned(),
            hash: hash.to_owned(),
            metadata: metadata.map(str::to_owned),
        };

        if let Some(last) = self.entries.last() {
            if last.order_key() >= entry.order_key() {
                return Err(Error::OutOfOrder {
                    last: format!("{} {}", last.entry_type.label(), last.id),
                    next: format!("{} {}", entry.entry_type.label(), entry.id),
                });
            }
        }

        self.writer
            .write_all(entry.serialize().as_bytes())
            .map_err(|source| Error::Write {
                path: self.next_path.to_string(),
                source,
            })?;
        self.aggregate.update(entry.hash_relevant());
        self.entries.push(entry);

        Ok(())
    }

    /// The fast path: if the previous manifest has `(entry_type, id)` with
    /// the same metadata, its hash is copied over and the caller can skip
    /// recomputing it. Returns whether the copy happened.
    pub fn copy_line_over_if_meta_is_same(
        &mut self,
        entry_type: EntryType,
        id: &str,
        metadata: &str,
    ) -> Result<bool, Error> {
        let Some(hash) = self.previous.as_ref().and_then(|previous| {
            let entry = previous.get(entry_type, id)?;
            (entry.metadata.as_deref() == Some(metadata)).then(|| entry.hash.clone())
        }) else {
            return Ok(false);
        };

        self.update(entry_type, id, &hash, Some(metadata))?;
        Ok(true)
    }

    /// Finalizes the build: flushes the `.next` file, writes the diff
    /// against the previous manifest, and atomically renames `.next` into
    /// place.
    pub fn end(mut self) -> Result<ManifestSummary, Error> {
        self.writer.flush().map_err(|source| Error::Write {
            path: self.next_path.to_string(),
            source,
        })?;
        drop(self.writer);

        let hash = self.aggregate.finish();
        let (had_previous, did_change) = match &self.previous {
            Some(previous) => (true, previous.aggregate_hash() != hash),
            None => (false, true),
        };

        let previous_entries = self
            .previous
            .as_ref()
            .map(PreviousManifest::entries)
            .unwrap_or_default();
        let diff = diff_entries(previous_entries, &self.entries);
        let mut diff_contents = diff.join("\n");
        if !diff_contents.is_empty() {
            diff_contents.push('\n');
        }
        let write_err = |path: &AbsoluteSystemPath, source| Error::Write {
            path: path.to_string(),
            source,
        };
        self.diff_path
            .ensure_dir()
            .map_err(|e| write_err(&self.diff_path, e))?;
        self.diff_path
            .create_with_contents(diff_contents)
            .map_err(|e| write_err(&self.diff_path, e))?;

        self.next_path
            .rename(&self.manifest_path)
            .map_err(|e| write_err(&self.manifest_path, e))?;

        debug!(
            "manifest {} finalized, changed: {did_change}",
            self.manifest_path
        );

        Ok(ManifestSummary {
            did_change,
            hash,
            had_previous,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn state_root() -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::try_from(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    fn build_two_entry_manifest(root: &AbsoluteSystemPath) -> ManifestSummary {
        let mut builder = ManifestBuilder::new(root, "build").unwrap();
        builder
            .update(EntryType::EnvVar, "CI", "aaa", None)
            .unwrap();
        builder
            .update(EntryType::File, "src/index.js", "bbb", Some("1000"))
            .unwrap();
        builder.end().unwrap()
    }

    #[test]
    fn test_first_build_is_a_change() {
        let (_dir, root) = state_root();
        let summary = build_two_entry_manifest(&root);
        assert!(summary.did_change);
        assert!(!summary.had_previous);
        assert!(manifest_path(&root, "build").exists());
        assert!(!next_manifest_path(&root, "build").exists());
    }

    #[test]
    fn test_identical_rebuild_is_unchanged_and_byte_identical() {
        let (_dir, root) = state_root();
        let first = build_two_entry_manifest(&root);
        let bytes_first = manifest_path(&root, "build").read_to_string().unwrap();

        let second = build_two_entry_manifest(&root);
        let bytes_second = manifest_path(&root, "build").read_to_string().unwrap();

        assert!(!second.did_change);
        assert!(second.had_previous);
        assert_eq!(first.hash, second.hash);
        assert_eq!(bytes_first, bytes_second);
        // empty diff on an unchanged rebuild
        assert_eq!(diff_path(&root, "build").read_to_string().unwrap(), "");
    }

    #[test]
    fn test_round_trip_preserves_entries() {
        let (_dir, root) = state_root();
        build_two_entry_manifest(&root);

        let manifest = read_manifest(&manifest_path(&root, "build"))
            .unwrap()
            .unwrap();
        assert_eq!(
            manifest.entries(),
            [
                ManifestEntry {
                    entry_type: EntryType::EnvVar,
                    id: "CI".into(),
                    hash: "aaa".into(),
                    metadata: None,
                },
                ManifestEntry {
                    entry_type: EntryType::File,
                    id: "src/index.js".into(),
                    hash: "bbb".into(),
                    metadata: Some("1000".into()),
                },
            ]
        );
    }

    #[test]
    fn test_copy_line_over_requires_matching_metadata() {
        let (_dir, root) = state_root();
        build_two_entry_manifest(&root);

        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        builder
            .update(EntryType::EnvVar, "CI", "aaa", None)
            .unwrap();
        // same mtime: the previous hash is reused
        assert!(builder
            .copy_line_over_if_meta_is_same(EntryType::File, "src/index.js", "1000")
            .unwrap());
        let summary = builder.end().unwrap();
        assert!(!summary.did_change);

        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        builder
            .update(EntryType::EnvVar, "CI", "aaa", None)
            .unwrap();
        // mtime moved: the caller must hash the content itself
        assert!(!builder
            .copy_line_over_if_meta_is_same(EntryType::File, "src/index.js", "2000")
            .unwrap());
        builder
            .update(EntryType::File, "src/index.js", "bbb", Some("2000"))
            .unwrap();
        let summary = builder.end().unwrap();
        // content hash unchanged, so the mtime-only move is not a change
        assert!(!summary.did_change);
    }

    #[test]
    fn test_out_of_order_entries_are_rejected() {
        let (_dir, root) = state_root();
        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        builder
            .update(EntryType::File, "b.txt", "aaa", None)
            .unwrap();

        // id going backwards within a type
        assert!(matches!(
            builder.update(EntryType::File, "a.txt", "bbb", None),
            Err(Error::OutOfOrder { .. })
        ));
        // duplicate (type, id)
        assert!(matches!(
            builder.update(EntryType::File, "b.txt", "ccc", None),
            Err(Error::OutOfOrder { .. })
        ));
        // type rank going backwards
        assert!(matches!(
            builder.update(EntryType::EnvVar, "CI", "ddd", None),
            Err(Error::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_tabs_in_fields_are_rejected() {
        let (_dir, root) = state_root();
        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        assert!(matches!(
            builder.update(EntryType::File, "bad\tid", "aaa", None),
            Err(Error::InvalidField(_))
        ));
    }

    #[test]
    fn test_diff_written_on_change() {
        let (_dir, root) = state_root();
        build_two_entry_manifest(&root);

        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        builder
            .update(EntryType::EnvVar, "CI", "aaa", None)
            .unwrap();
        builder
            .update(EntryType::File, "src/index.js", "changed", Some("2000"))
            .unwrap();
        builder
            .update(EntryType::File, "src/new.js", "eee", Some("2000"))
            .unwrap();
        let summary = builder.end().unwrap();
        assert!(summary.did_change);

        assert_eq!(
            diff_path(&root, "build").read_to_string().unwrap(),
            "± changed file src/index.js\n+ added file src/new.js\n"
        );
    }

    #[test]
    fn test_did_change_iff_hash_differs() {
        let (_dir, root) = state_root();
        let first = build_two_entry_manifest(&root);

        let mut builder = ManifestBuilder::new(&root, "build").unwrap();
        builder
            .update(EntryType::EnvVar, "CI", "zzz", None)
            .unwrap();
        builder
            .update(EntryType::File, "src/index.js", "bbb", Some("1000"))
            .unwrap();
        let second = builder.end().unwrap();
        assert!(second.did_change);
        assert_ne!(first.hash, second.hash);
    }
}
