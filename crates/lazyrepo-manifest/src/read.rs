use std::collections::HashMap;

use lazypath::AbsoluteSystemPath;
use lazyrepo_hash::AggregateHasher;

use crate::{EntryType, Error, ManifestEntry};

/// A parsed previous manifest: the ordered entries, a `(type, id)` lookup
/// for the copy-over fast path, and the aggregate hash it carried.
#[derive(Debug)]
pub struct PreviousManifest {
    entries: Vec<ManifestEntry>,
    lookup: HashMap<(EntryType, String), usize>,
    aggregate_hash: String,
}

impl PreviousManifest {
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn aggregate_hash(&self) -> &str {
        &self.aggregate_hash
    }

    pub fn get(&self, entry_type: EntryType, id: &str) -> Option<&ManifestEntry> {
        // The borrow checker wants an owned key here; ids are short.
        self.lookup
            .get(&(entry_type, id.to_owned()))
            .map(|&index| &self.entries[index])
    }
}

/// Reads and parses the manifest at `path`. A missing file is the normal
/// first-run case and parses to `None`.
pub fn read_manifest(path: &AbsoluteSystemPath) -> Result<Option<PreviousManifest>, Error> {
    let contents = match path.read_to_string() {
        Ok(contents) => contents,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Read {
                path: path.to_string(),
                source,
            })
        }
    };

    let mut entries = Vec::new();
    let mut lookup = HashMap::new();
    let mut aggregate = AggregateHasher::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        let entry = parse_line(path, line)?;
        aggregate.update(entry.hash_relevant());
        lookup.insert((entry.entry_type, entry.id.clone()), entries.len());
        entries.push(entry);
    }

    Ok(Some(PreviousManifest {
        entries,
        lookup,
        aggregate_hash: aggregate.finish(),
    }))
}

fn parse_line(path: &AbsoluteSystemPath, line: &str) -> Result<ManifestEntry, Error> {
    let mut fields = line.split('\t');
    let (Some(type_label), Some(id), Some(hash)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::MalformedLine {
            path: path.to_string(),
            line: line.to_owned(),
        });
    };

    let entry_type = EntryType::from_label(type_label).ok_or_else(|| Error::UnknownEntryType {
        path: path.to_string(),
        found: type_label.to_owned(),
    })?;

    Ok(ManifestEntry {
        entry_type,
        id: id.to_owned(),
        hash: hash.to_owned(),
        metadata: fields.next().map(str::to_owned),
    })
}
