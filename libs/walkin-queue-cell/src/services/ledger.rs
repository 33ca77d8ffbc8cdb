use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::WalkInQueueError;
use crate::models::{PriorityCategory, QueueEntry, QueueStatus, VisitRecord, VisitStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    TurnNow,
    TurnSoon,
}

/// Persistence contract the queue algorithms depend on. The two operations
/// with atomicity requirements are `next_queue_number` (no duplicate tickets
/// under concurrent check-ins) and `compare_and_transition` (conditional
/// status update that fails with `StaleStatus` when another caller got
/// there first).
#[async_trait]
pub trait QueueLedger: Send + Sync {
    async fn create_entry(&self, entry: QueueEntry) -> Result<QueueEntry, WalkInQueueError>;

    async fn entry(&self, entry_id: Uuid) -> Result<Option<QueueEntry>, WalkInQueueError>;

    /// Field-scoped write of the administrative category override. Never
    /// touches status, so it cannot resurrect an entry a concurrent caller
    /// just transitioned.
    async fn write_priority(
        &self,
        entry_id: Uuid,
        category: PriorityCategory,
        score: i32,
    ) -> Result<(), WalkInQueueError>;

    /// Field-scoped write of the nursing triage level.
    async fn write_triage(
        &self,
        entry_id: Uuid,
        triage_level: u8,
    ) -> Result<(), WalkInQueueError>;

    async fn next_queue_number(
        &self,
        tenant_id: Uuid,
        branch_id: Uuid,
        day: NaiveDate,
    ) -> Result<i32, WalkInQueueError>;

    async fn find_non_terminal_entry(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError>;

    async fn count_waiting(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<u64, WalkInQueueError>;

    async fn waiting_entries(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<QueueEntry>, WalkInQueueError>;

    async fn in_progress_entry(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError>;

    /// Conditionally move an entry between statuses. Stamps `called_at`
    /// (and the room) on the way into `InProgress` and `completed_at` on
    /// the way out of it. Fails with `StaleStatus` if the entry no longer
    /// holds `expected`, which callers treat as "someone else already
    /// acted" rather than a user-facing failure.
    async fn compare_and_transition(
        &self,
        entry_id: Uuid,
        expected: QueueStatus,
        new: QueueStatus,
        room_number: Option<String>,
    ) -> Result<QueueEntry, WalkInQueueError>;

    /// Cache refresh written by the bulk reprioritize pass. Readers always
    /// recompute rank from the waiting set; these columns only feed
    /// dashboards that read entries directly.
    async fn write_rank(
        &self,
        entry_id: Uuid,
        position: i32,
        eta_minutes: i64,
    ) -> Result<(), WalkInQueueError>;

    async fn mark_notified(
        &self,
        entry_id: Uuid,
        kind: NotificationKind,
    ) -> Result<(), WalkInQueueError>;

    /// Realized consultation durations (minutes) for completed visits of a
    /// doctor since the given instant. Feeds the 30-day average.
    async fn consultation_durations_since(
        &self,
        doctor_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, WalkInQueueError>;

    /// Completed waits (check-in to completion, minutes) for a doctor on
    /// the given day. Feeds the live dashboard average.
    async fn completed_waits_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<i64>, WalkInQueueError>;

    async fn create_visit(&self, visit: VisitRecord) -> Result<VisitRecord, WalkInQueueError>;

    async fn visit(&self, visit_id: Uuid) -> Result<Option<VisitRecord>, WalkInQueueError>;

    async fn update_visit(&self, visit: &VisitRecord) -> Result<(), WalkInQueueError>;
}

#[derive(Default)]
struct InMemoryState {
    entries: HashMap<Uuid, QueueEntry>,
    visits: HashMap<Uuid, VisitRecord>,
    counters: HashMap<(Uuid, Uuid, NaiveDate), i32>,
}

/// Single-process ledger over tokio's RwLock. Atomicity of queue numbers
/// and conditional transitions falls out of the write lock. Used by the
/// test suite and by single-node deployments without a Supabase project.
#[derive(Default)]
pub struct InMemoryQueueLedger {
    state: RwLock<InMemoryState>,
}

impl InMemoryQueueLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueLedger for InMemoryQueueLedger {
    async fn create_entry(&self, entry: QueueEntry) -> Result<QueueEntry, WalkInQueueError> {
        let mut state = self.state.write().await;
        state.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn entry(&self, entry_id: Uuid) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state.entries.get(&entry_id).cloned())
    }

    async fn write_priority(
        &self,
        entry_id: Uuid,
        category: PriorityCategory,
        score: i32,
    ) -> Result<(), WalkInQueueError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;
        entry.priority_category = category;
        entry.priority_score = score;
        Ok(())
    }

    async fn write_triage(
        &self,
        entry_id: Uuid,
        triage_level: u8,
    ) -> Result<(), WalkInQueueError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;
        entry.triage_level = Some(triage_level);
        Ok(())
    }

    async fn next_queue_number(
        &self,
        tenant_id: Uuid,
        branch_id: Uuid,
        day: NaiveDate,
    ) -> Result<i32, WalkInQueueError> {
        let mut state = self.state.write().await;
        let counter = state.counters.entry((tenant_id, branch_id, day)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn find_non_terminal_entry(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .find(|e| {
                e.tenant_id == tenant_id
                    && e.patient_id == patient_id
                    && e.doctor_id == doctor_id
                    && e.service_date == day
                    && e.is_active()
            })
            .cloned())
    }

    async fn count_waiting(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<u64, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.doctor_id == doctor_id
                    && e.service_date == day
                    && e.status == QueueStatus::Waiting
            })
            .count() as u64)
    }

    async fn waiting_entries(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<QueueEntry>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.doctor_id == doctor_id
                    && e.service_date == day
                    && e.status == QueueStatus::Waiting
            })
            .cloned()
            .collect())
    }

    async fn in_progress_entry(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .find(|e| {
                e.tenant_id == tenant_id
                    && e.doctor_id == doctor_id
                    && e.service_date == day
                    && e.status == QueueStatus::InProgress
            })
            .cloned())
    }

    async fn compare_and_transition(
        &self,
        entry_id: Uuid,
        expected: QueueStatus,
        new: QueueStatus,
        room_number: Option<String>,
    ) -> Result<QueueEntry, WalkInQueueError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;

        if entry.status != expected {
            return Err(WalkInQueueError::StaleStatus {
                entry_id,
                expected: format!("{:?}", expected),
                actual: format!("{:?}", entry.status),
            });
        }

        if !entry.status.can_transition_to(&new) {
            return Err(WalkInQueueError::InvalidStatusTransition {
                from: format!("{:?}", entry.status),
                to: format!("{:?}", new),
            });
        }

        entry.status = new;
        match new {
            QueueStatus::InProgress => {
                entry.called_at = Some(Utc::now());
                if room_number.is_some() {
                    entry.room_number = room_number;
                }
            }
            QueueStatus::Completed | QueueStatus::Cancelled => {
                entry.completed_at = Some(Utc::now());
            }
            QueueStatus::Waiting => {}
        }

        Ok(entry.clone())
    }

    async fn write_rank(
        &self,
        entry_id: Uuid,
        position: i32,
        eta_minutes: i64,
    ) -> Result<(), WalkInQueueError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;
        entry.queue_position = position;
        entry.estimated_wait_minutes = eta_minutes;
        Ok(())
    }

    async fn mark_notified(
        &self,
        entry_id: Uuid,
        kind: NotificationKind,
    ) -> Result<(), WalkInQueueError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;
        match kind {
            NotificationKind::TurnNow => entry.turn_now_sent = true,
            NotificationKind::TurnSoon => entry.turn_soon_sent = true,
        }
        Ok(())
    }

    async fn consultation_durations_since(
        &self,
        doctor_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .visits
            .values()
            .filter(|v| {
                v.doctor_id == doctor_id
                    && v.status == VisitStatus::Completed
                    && v.completed_at.map(|t| t >= since).unwrap_or(false)
            })
            .filter_map(|v| v.duration_minutes)
            .collect())
    }

    async fn completed_waits_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<i64>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| {
                e.doctor_id == doctor_id
                    && e.service_date == day
                    && e.status == QueueStatus::Completed
            })
            .filter_map(|e| {
                e.completed_at
                    .map(|done| (done - e.checked_in_at).num_minutes())
            })
            .collect())
    }

    async fn create_visit(&self, visit: VisitRecord) -> Result<VisitRecord, WalkInQueueError> {
        let mut state = self.state.write().await;
        state.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    async fn visit(&self, visit_id: Uuid) -> Result<Option<VisitRecord>, WalkInQueueError> {
        let state = self.state.read().await;
        Ok(state.visits.get(&visit_id).cloned())
    }

    async fn update_visit(&self, visit: &VisitRecord) -> Result<(), WalkInQueueError> {
        let mut state = self.state.write().await;
        state.visits.insert(visit.id, visit.clone());
        Ok(())
    }
}
