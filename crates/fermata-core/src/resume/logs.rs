//! Block-log merging.
//!
//! A resume has two log sources: the logs stored with the pause record and
//! the logs produced by the resumed traversal. Merging is first-seen-wins by
//! a stable key, so a redelivered resume (network retry) never duplicates
//! entries, then sorted by start time so the merged list reads in execution
//! order.

use std::collections::HashSet;

use fermata_types::execution::BlockLog;

/// Merge `incoming` into `base`, keeping the first-seen entry for each key.
pub fn merge_logs(base: &[BlockLog], incoming: &[BlockLog]) -> Vec<BlockLog> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<BlockLog> = Vec::with_capacity(base.len() + incoming.len());

    for log in base.iter().chain(incoming.iter()) {
        if seen.insert(log.merge_key()) {
            merged.push(log.clone());
        }
    }

    merged.sort_by_key(|log| log.started_at);
    merged
}

/// Logs for blocks that ran after this resume: everything in `merged` whose
/// block id was not already executed before the resume.
pub fn incremental_logs(
    merged: &[BlockLog],
    pre_resume_executed: &HashSet<String>,
) -> Vec<BlockLog> {
    merged
        .iter()
        .filter(|log| !pre_resume_executed.contains(&log.block_id))
        .cloned()
        .collect()
}
