use crate::ManifestEntry;

/// Produces the human-readable change list between two manifests, both in
/// canonical order. Lines are emitted in canonical order of the ids they
/// mention, so the diff itself is deterministic. Metadata is not compared:
/// two entries with equal `(type, id, hash)` are the same input.
pub fn diff_entries(previous: &[ManifestEntry], next: &[ManifestEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut prev_iter = previous.iter().peekable();
    let mut next_iter = next.iter().peekable();

    loop {
        match (prev_iter.peek(), next_iter.peek()) {
            (None, None) => break,
            (Some(prev), None) => {
                lines.push(removed(prev));
                prev_iter.next();
            }
            (None, Some(new)) => {
                lines.push(added(new));
                next_iter.next();
            }
            (Some(prev), Some(new)) => match prev.order_key().cmp(&new.order_key()) {
                std::cmp::Ordering::Less => {
                    lines.push(removed(prev));
                    prev_iter.next();
                }
                std::cmp::Ordering::Greater => {
                    lines.push(added(new));
                    next_iter.next();
                }
                std::cmp::Ordering::Equal => {
                    if prev.hash != new.hash {
                        lines.push(changed(new));
                    }
                    prev_iter.next();
                    next_iter.next();
                }
            },
        }
    }

    lines
}

fn added(entry: &ManifestEntry) -> String {
    format!("+ added {} {}", entry.entry_type.label(), entry.id)
}

fn removed(entry: &ManifestEntry) -> String {
    format!("- removed {} {}", entry.entry_type.label(), entry.id)
}

fn changed(entry: &ManifestEntry) -> String {
    format!("± changed {} {}", entry.entry_type.label(), entry.id)
}
