use std::cmp::Ordering;

use crate::models::QueueEntry;
use crate::services::priority::PriorityPolicy;

/// Canonical comparator over waiting entries: effective score descending,
/// then check-in time ascending, then queue number ascending. The live
/// queue view, the bulk reprioritize pass and next-patient selection all
/// go through this single function so the displayed order and the actual
/// call order cannot diverge.
pub fn compare_waiting(policy: &PriorityPolicy, a: &QueueEntry, b: &QueueEntry) -> Ordering {
    policy
        .effective_score(b)
        .cmp(&policy.effective_score(a))
        .then_with(|| a.checked_in_at.cmp(&b.checked_in_at))
        .then_with(|| a.queue_number.cmp(&b.queue_number))
}

/// Sort a waiting set into call order. The 1-based index into the result
/// is the entry's live queue position.
pub fn rank_waiting(policy: &PriorityPolicy, mut entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
    entries.sort_by(|a, b| compare_waiting(policy, a, b));
    entries
}

pub fn next_in_line(policy: &PriorityPolicy, entries: &[QueueEntry]) -> Option<QueueEntry> {
    entries
        .iter()
        .min_by(|a, b| compare_waiting(policy, a, b))
        .cloned()
}
