use std::fmt;

/// The kind of input an entry fingerprints. Variant order is the canonical
/// type rank the manifest sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryType {
    UpstreamTaskInputs,
    UpstreamPackageInputs,
    EnvVar,
    File,
}

impl EntryType {
    pub const ALL: [EntryType; 4] = [
        EntryType::UpstreamTaskInputs,
        EntryType::UpstreamPackageInputs,
        EntryType::EnvVar,
        EntryType::File,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EntryType::UpstreamTaskInputs => "upstream task inputs",
            EntryType::UpstreamPackageInputs => "upstream package inputs",
            EntryType::EnvVar => "env var",
            EntryType::File => "file",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == label)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fingerprinted input: `(type, id, hash, metadata)`.
///
/// `id` is a task key for the upstream types, an env var name, or a
/// repo-relative unix file path. `metadata` is opaque to the format; for
/// files it carries the mtime in milliseconds so unchanged files can skip
/// re-hashing on the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub entry_type: EntryType,
    pub id: String,
    pub hash: String,
    pub metadata: Option<String>,
}

impl ManifestEntry {
    /// The full on-disk line, newline included.
    pub fn serialize(&self) -> String {
        match &self.metadata {
            Some(metadata) => format!(
                "{}\t{}\t{}\t{}\n",
                self.entry_type.label(),
                self.id,
                self.hash,
                metadata
            ),
            None => format!("{}\t{}\t{}\n", self.entry_type.label(), self.id, self.hash),
        }
    }

    /// The prefix of the line that feeds the aggregate hash. Metadata is
    /// deliberately left out: an mtime that moved while the content hash
    /// stayed put must not bust the cache.
    pub fn hash_relevant(&self) -> String {
        format!("{}\t{}\t{}\n", self.entry_type.label(), self.id, self.hash)
    }

    /// The canonical sort key.
    pub fn order_key(&self) -> (EntryType, &str) {
        (self.entry_type, &self.id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_rank_order() {
        let mut labels: Vec<_> = EntryType::ALL.to_vec();
        labels.sort();
        assert_eq!(
            labels
                .iter()
                .map(EntryType::label)
                .collect::<Vec<_>>(),
            [
                "upstream task inputs",
                "upstream package inputs",
                "env var",
                "file"
            ]
        );
    }

    #[test]
    fn test_serialize_with_and_without_metadata() {
        let with_meta = ManifestEntry {
            entry_type: EntryType::File,
            id: "packages/utils/index.js".into(),
            hash: "abc123".into(),
            metadata: Some("1700000000000".into()),
        };
        assert_eq!(
            with_meta.serialize(),
            "file\tpackages/utils/index.js\tabc123\t1700000000000\n"
        );

        let without_meta = ManifestEntry {
            entry_type: EntryType::EnvVar,
            id: "CI".into(),
            hash: "def456".into(),
            metadata: None,
        };
        assert_eq!(without_meta.serialize(), "env var\tCI\tdef456\n");
    }

    #[test]
    fn test_hash_relevant_drops_metadata() {
        let entry = ManifestEntry {
            entry_type: EntryType::File,
            id: "a.txt".into(),
            hash: "abc".into(),
            metadata: Some("123".into()),
        };
        assert_eq!(entry.hash_relevant(), "file\ta.txt\tabc\n");
    }
}
