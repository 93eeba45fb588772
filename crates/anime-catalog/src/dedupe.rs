//! Identifier-based deduplication of canonical records.

use std::collections::HashSet;

use shared::CanonicalAnime;

/// Drop repeated ids, keeping the first occurrence and the original order
pub fn dedupe(records: Vec<CanonicalAnime>) -> Vec<CanonicalAnime> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.id))
        .collect()
}

/// `existing` followed by those `incoming` records whose id is not already
/// present. Neither input is modified.
pub fn merge_unique(existing: &[CanonicalAnime], incoming: &[CanonicalAnime]) -> Vec<CanonicalAnime> {
    let mut seen: HashSet<u64> = existing.iter().map(|record| record.id).collect();
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    merged.extend_from_slice(existing);
    merged.extend(
        incoming
            .iter()
            .filter(|record| seen.insert(record.id))
            .cloned(),
    );
    merged
}
