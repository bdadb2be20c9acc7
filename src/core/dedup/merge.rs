//! Phase 2: identity re-verification and merge.

use crate::core::hasher::ContentHasher;
use crate::core::record::{DateConfidence, PhotoRecord};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Index of the best candidate: best date tier, then shortest path, then
/// lexical path order.
pub fn choose_representative<'a, I>(candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (DateConfidence, &'a Path)>,
{
    candidates
        .into_iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.as_os_str().len().cmp(&b.1.as_os_str().len()))
                .then_with(|| a.1.cmp(b.1))
        })
        .map(|(idx, _)| idx)
}

/// Collapse records whose content is identical.
///
/// Records are grouped by size first; a size seen once is accepted as
/// unique without hashing. Larger groups are partitioned by hash, hashing
/// any record that has none yet. Records whose hash fails are isolated and
/// flagged. Output keeps first-appearance order.
pub fn merge_identical(records: Vec<PhotoRecord>, hasher: &dyn ContentHasher) -> Vec<PhotoRecord> {
    let mut size_groups: Vec<Vec<PhotoRecord>> = Vec::new();
    let mut by_size: HashMap<u64, usize> = HashMap::new();
    for record in records {
        let slot = *by_size.entry(record.identity.size).or_insert_with(|| {
            size_groups.push(Vec::new());
            size_groups.len() - 1
        });
        size_groups[slot].push(record);
    }

    let mut merged = Vec::new();
    for group in size_groups {
        if group.len() == 1 {
            merged.extend(group);
            continue;
        }

        let mut hash_groups: Vec<Vec<PhotoRecord>> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for mut record in group {
            let key = identity_key(&mut record, hasher);
            let slot = *by_key.entry(key).or_insert_with(|| {
                hash_groups.push(Vec::new());
                hash_groups.len() - 1
            });
            hash_groups[slot].push(record);
        }

        merged.extend(hash_groups.into_iter().map(merge_group));
    }
    merged
}

/// Hash key for a record, computing the hash when missing
fn identity_key(record: &mut PhotoRecord, hasher: &dyn ContentHasher) -> String {
    let isolated = |record: &PhotoRecord| {
        format!(
            "nohash:{}:{}",
            record.identity.size,
            record.source_path.display()
        )
    };

    if record.identity.hash_failed {
        return isolated(record);
    }
    if let Some(hash) = &record.identity.hash {
        return hash.clone();
    }

    match hasher.hash_file(&record.source_path) {
        Ok(hash) => {
            record.identity.hash = Some(hash.clone());
            hash
        }
        Err(e) => {
            warn!(path = %record.source_path.display(), "hash failed during merge: {}", e);
            record.identity.hash_failed = true;
            isolated(record)
        }
    }
}

fn merge_group(mut members: Vec<PhotoRecord>) -> PhotoRecord {
    if members.len() == 1 {
        return members.remove(0);
    }
    let idx = choose_representative(
        members
            .iter()
            .map(|r| (r.date_confidence, r.source_path.as_path())),
    )
    .unwrap_or(0);

    let mut representative = members.remove(idx);
    debug!(
        path = %representative.source_path.display(),
        merged = members.len(),
        "merged identical records"
    );
    for other in members {
        representative.absorb(other);
    }
    representative
}
