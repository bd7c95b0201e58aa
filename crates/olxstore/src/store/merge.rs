//! # Union-Mount Merging
//!
//! Pure folds used by [`LayeredStore`](super::LayeredStore) to combine member
//! results. Inputs to the `*_all` helpers are in priority order (index 0 is the
//! highest priority); they fold right-to-left so higher-priority entries always
//! overwrite lower-priority ones.
//!
//! - Directories merge recursively.
//! - Files are replaced wholesale, never merged field by field.
//! - A scan id ends up in exactly one bucket: the one reported by the
//!   highest-priority store that reported it, except that a live report
//!   always beats a deletion.

use crate::model::{DirEntry, FileRecord, ScanResult, TreeEntry};
use crate::paths::ProvenanceUri;
use std::collections::BTreeMap;

/// Overlay `higher` onto `lower`.
pub fn merge_trees(mut lower: DirEntry, higher: DirEntry) -> DirEntry {
    for (name, high_entry) in higher.children {
        let merged = match (lower.children.remove(&name), high_entry) {
            (Some(TreeEntry::Directory(low_dir)), TreeEntry::Directory(high_dir)) => {
                TreeEntry::Directory(merge_trees(low_dir, high_dir))
            }
            (_, high_entry) => high_entry,
        };
        lower.children.insert(name, merged);
    }
    DirEntry {
        name: higher.name,
        path: higher.path,
        children: lower.children,
    }
}

pub fn merge_all_trees(trees: Vec<DirEntry>) -> DirEntry {
    trees
        .into_iter()
        .rev()
        .fold(DirEntry::root(), merge_trees)
}

#[derive(Clone, Copy)]
enum Bucket {
    Added,
    Changed,
    Unchanged,
    Deleted,
}

fn into_assignments(scan: ScanResult) -> impl Iterator<Item = (ProvenanceUri, (Bucket, FileRecord))> {
    let tag = |bucket: Bucket, map: BTreeMap<ProvenanceUri, FileRecord>| {
        map.into_iter().map(move |(id, record)| (id, (bucket, record)))
    };
    tag(Bucket::Added, scan.added)
        .chain(tag(Bucket::Changed, scan.changed))
        .chain(tag(Bucket::Unchanged, scan.unchanged))
        .chain(tag(Bucket::Deleted, scan.deleted))
}

/// Overlay `higher` onto `lower`, keeping buckets mutually exclusive.
///
/// A live entry (added, changed, unchanged) from either side beats a
/// `Deleted` for the same id: a file some member still holds is not gone.
pub fn merge_scans(lower: ScanResult, higher: ScanResult) -> ScanResult {
    let mut assignments: BTreeMap<ProvenanceUri, (Bucket, FileRecord)> =
        into_assignments(lower).collect();
    for (id, (bucket, record)) in into_assignments(higher) {
        let keeps_lower = matches!(bucket, Bucket::Deleted)
            && matches!(assignments.get(&id), Some((b, _)) if !matches!(b, Bucket::Deleted));
        if !keeps_lower {
            assignments.insert(id, (bucket, record));
        }
    }

    let mut merged = ScanResult::default();
    for (id, (bucket, record)) in assignments {
        let target = match bucket {
            Bucket::Added => &mut merged.added,
            Bucket::Changed => &mut merged.changed,
            Bucket::Unchanged => &mut merged.unchanged,
            Bucket::Deleted => &mut merged.deleted,
        };
        target.insert(id, record);
    }
    merged
}

pub fn merge_all_scans(scans: Vec<ScanResult>) -> ScanResult {
    scans
        .into_iter()
        .rev()
        .fold(ScanResult::default(), merge_scans)
}
