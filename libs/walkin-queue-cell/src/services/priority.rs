use std::collections::HashMap;

use crate::models::{PriorityCategory, QueueEntry};

/// Scoring tables for queue ordering. Category scores are assigned at the
/// front desk; triage scores come from nursing assessment and sit on a
/// separate axis. Both tables are plain data so a deployment can swap its
/// own policy in without touching the ordering code.
#[derive(Debug, Clone)]
pub struct PriorityPolicy {
    category_scores: HashMap<PriorityCategory, i32>,
    triage_scores: HashMap<u8, i32>,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        let category_scores = HashMap::from([
            (PriorityCategory::Emergency, 100),
            (PriorityCategory::Urgent, 80),
            (PriorityCategory::SeniorCitizen, 60),
            (PriorityCategory::Pregnant, 60),
            (PriorityCategory::WithChild, 50),
            (PriorityCategory::Regular, 0),
            (PriorityCategory::LateArrival, -10),
        ]);
        let triage_scores = HashMap::from([(1, 200), (2, 150), (3, 100), (4, 50), (5, 25)]);

        Self {
            category_scores,
            triage_scores,
        }
    }
}

impl PriorityPolicy {
    pub fn new(
        category_scores: HashMap<PriorityCategory, i32>,
        triage_scores: HashMap<u8, i32>,
    ) -> Self {
        Self {
            category_scores,
            triage_scores,
        }
    }

    pub fn category_score(&self, category: PriorityCategory) -> i32 {
        self.category_scores.get(&category).copied().unwrap_or(0)
    }

    pub fn triage_adjustment(&self, triage_level: Option<u8>) -> i32 {
        triage_level
            .and_then(|level| self.triage_scores.get(&level).copied())
            .unwrap_or(0)
    }

    pub fn is_valid_triage_level(&self, level: u8) -> bool {
        self.triage_scores.contains_key(&level)
    }

    /// The combined rank used everywhere an ordering decision is made.
    /// Category overrides replace the base score; triage adds on top of it.
    pub fn effective_score(&self, entry: &QueueEntry) -> i32 {
        entry.priority_score + self.triage_adjustment(entry.triage_level)
    }
}
