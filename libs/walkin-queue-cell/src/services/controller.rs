use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::WalkInQueueError;
use crate::models::{
    CallNextOutcome, CheckInRequest, CheckInResponse, LiveQueueEntry, LiveQueueView,
    PriorityCategory, PublicDisplayEntry, PublicDisplayView, QueueEntry, QueueStatsView,
    QueueStatus, VisitRecord, VisitStatus,
};
use crate::services::directory::Directory;
use crate::services::estimator::WaitTimeEstimator;
use crate::services::ledger::{NotificationKind, QueueLedger};
use crate::services::notify::NotificationPort;
use crate::services::ordering;
use crate::services::priority::PriorityPolicy;

const CALL_NEXT_MAX_ATTEMPTS: u32 = 3;
const TURN_SOON_WINDOW: usize = 2;
const PUBLIC_DISPLAY_LIMIT: usize = 5;

/// Orchestrates the walk-in queue: check-in, call-next, cancellation and
/// reprioritisation. Status transitions are the correctness-critical part
/// and are double-guarded: a per-doctor mutex serialises call-next and the
/// bulk reprioritise within this process, and the ledger's conditional
/// transition catches races across processes.
pub struct WalkInQueueService {
    ledger: Arc<dyn QueueLedger>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn NotificationPort>,
    policy: PriorityPolicy,
    estimator: WaitTimeEstimator,
    doctor_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl WalkInQueueService {
    pub fn new(
        ledger: Arc<dyn QueueLedger>,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn NotificationPort>,
        policy: PriorityPolicy,
        estimator: WaitTimeEstimator,
    ) -> Self {
        Self {
            ledger,
            directory,
            notifier,
            policy,
            estimator,
            doctor_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn doctor_lock(&self, doctor_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.doctor_locks.lock().await;
        locks
            .entry(doctor_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn patient_phone(&self, tenant_id: Uuid, patient_id: Uuid) -> Option<String> {
        match self.directory.find_patient(tenant_id, patient_id).await {
            Ok(Some(patient)) => patient.phone_number,
            Ok(None) => None,
            Err(e) => {
                warn!("Patient lookup for notification failed: {}", e);
                None
            }
        }
    }

    pub async fn add_to_queue(
        &self,
        request: CheckInRequest,
    ) -> Result<CheckInResponse, WalkInQueueError> {
        let patient = self
            .directory
            .find_patient(request.tenant_id, request.patient_id)
            .await?
            .ok_or(WalkInQueueError::PatientNotFound(request.patient_id))?;

        let doctor = self
            .directory
            .find_doctor(request.tenant_id, request.doctor_id)
            .await?
            .filter(|d| d.is_clinician())
            .ok_or(WalkInQueueError::DoctorNotFound(request.doctor_id))?;

        let day = Utc::now().date_naive();

        if let Some(existing) = self
            .ledger
            .find_non_terminal_entry(request.tenant_id, request.patient_id, request.doctor_id, day)
            .await?
        {
            debug!(
                "Duplicate check-in blocked, entry {} is still {:?}",
                existing.id, existing.status
            );
            return Err(WalkInQueueError::AlreadyInQueue {
                patient_id: request.patient_id,
            });
        }

        let queue_number = self
            .ledger
            .next_queue_number(request.tenant_id, request.branch_id, day)
            .await?;

        let position = self
            .ledger
            .count_waiting(request.tenant_id, request.doctor_id, day)
            .await? as i32
            + 1;

        let estimated_wait_minutes = self
            .estimator
            .estimated_wait_minutes(position, request.doctor_id)
            .await?;

        let category = request.priority_category.unwrap_or_default();
        let now = Utc::now();
        let entry_id = Uuid::new_v4();
        let visit_id = Uuid::new_v4();

        let visit = VisitRecord {
            id: visit_id,
            tenant_id: request.tenant_id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            queue_entry_id: entry_id,
            status: VisitStatus::CheckedIn,
            complaint: request.complaint.clone(),
            cancellation_reason: None,
            checked_in_at: now,
            started_at: None,
            completed_at: None,
            duration_minutes: None,
        };

        let entry = QueueEntry {
            id: entry_id,
            tenant_id: request.tenant_id,
            branch_id: request.branch_id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            visit_id,
            service_date: day,
            queue_number,
            priority_category: category,
            priority_score: self.policy.category_score(category),
            triage_level: None,
            queue_position: position,
            estimated_wait_minutes,
            status: QueueStatus::Waiting,
            room_number: None,
            checked_in_at: now,
            called_at: None,
            completed_at: None,
            turn_now_sent: false,
            turn_soon_sent: false,
        };

        self.ledger.create_visit(visit).await?;
        let entry = self.ledger.create_entry(entry).await?;

        let notification_sent = match &patient.phone_number {
            Some(phone) => {
                self.notifier
                    .send_queue_registered(
                        phone,
                        &patient.full_name(),
                        &entry.queue_label(),
                        estimated_wait_minutes,
                    )
                    .await
            }
            None => false,
        };

        info!(
            "Checked in patient {} as {} for doctor {} (position {})",
            patient.id,
            entry.queue_label(),
            doctor.id,
            position
        );

        Ok(CheckInResponse {
            entry_id: entry.id,
            visit_id: entry.visit_id,
            queue_number: entry.queue_label(),
            queue_position: position,
            estimated_wait_minutes,
            notification_sent,
        })
    }

    pub async fn call_next_patient(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        room_number: Option<String>,
    ) -> Result<CallNextOutcome, WalkInQueueError> {
        let lock = self.doctor_lock(doctor_id).await;
        let _guard = lock.lock().await;

        let day = Utc::now().date_naive();
        let mut completed_entry_id = None;

        if let Some(current) = self
            .ledger
            .in_progress_entry(tenant_id, doctor_id, day)
            .await?
        {
            match self
                .ledger
                .compare_and_transition(
                    current.id,
                    QueueStatus::InProgress,
                    QueueStatus::Completed,
                    None,
                )
                .await
            {
                Ok(done) => {
                    completed_entry_id = Some(done.id);
                    self.close_visit(&done).await?;
                }
                Err(WalkInQueueError::StaleStatus { entry_id, .. }) => {
                    debug!("Entry {} was already closed by another caller", entry_id);
                }
                Err(e) => return Err(e),
            }
        }

        let mut called: Option<QueueEntry> = None;
        for attempt in 1..=CALL_NEXT_MAX_ATTEMPTS {
            let waiting = self
                .ledger
                .waiting_entries(tenant_id, doctor_id, day)
                .await?;

            let Some(candidate) = ordering::next_in_line(&self.policy, &waiting) else {
                break;
            };

            match self
                .ledger
                .compare_and_transition(
                    candidate.id,
                    QueueStatus::Waiting,
                    QueueStatus::InProgress,
                    room_number.clone(),
                )
                .await
            {
                Ok(entry) => {
                    called = Some(entry);
                    break;
                }
                Err(WalkInQueueError::StaleStatus { entry_id, .. }) => {
                    warn!(
                        "Lost call-next race on entry {} (attempt {}), reselecting",
                        entry_id, attempt
                    );
                    if attempt == CALL_NEXT_MAX_ATTEMPTS {
                        return Err(WalkInQueueError::Conflict {
                            doctor_id,
                            attempts: attempt,
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let Some(mut called_entry) = called else {
            debug!("No waiting patients for doctor {}", doctor_id);
            return Ok(CallNextOutcome {
                called: None,
                completed_entry_id,
                turn_now_sent: false,
                turn_soon_notified: 0,
            });
        };

        if let Some(mut visit) = self.ledger.visit(called_entry.visit_id).await? {
            visit.status = VisitStatus::InConsultation;
            visit.started_at = called_entry.called_at;
            self.ledger.update_visit(&visit).await?;
        }

        let mut turn_now_sent = called_entry.turn_now_sent;
        if !called_entry.turn_now_sent {
            if let Some(phone) = self.patient_phone(tenant_id, called_entry.patient_id).await {
                let room_label = called_entry
                    .room_number
                    .clone()
                    .unwrap_or_else(|| "the consulting room".to_string());
                if self.notifier.send_turn_now(&phone, &room_label).await {
                    self.ledger
                        .mark_notified(called_entry.id, NotificationKind::TurnNow)
                        .await?;
                    called_entry.turn_now_sent = true;
                    turn_now_sent = true;
                }
            }
        }

        let turn_soon_notified = self.notify_turn_soon(tenant_id, doctor_id, day).await?;

        info!(
            "Called {} for doctor {} ({} turn-soon notices sent)",
            called_entry.queue_label(),
            doctor_id,
            turn_soon_notified
        );

        Ok(CallNextOutcome {
            called: Some(called_entry),
            completed_entry_id,
            turn_now_sent,
            turn_soon_notified,
        })
    }

    async fn close_visit(&self, done: &QueueEntry) -> Result<(), WalkInQueueError> {
        if let Some(mut visit) = self.ledger.visit(done.visit_id).await? {
            let completed_at = done.completed_at.unwrap_or_else(Utc::now);
            visit.status = VisitStatus::Completed;
            visit.completed_at = Some(completed_at);
            visit.duration_minutes = done
                .called_at
                .map(|called| (completed_at - called).num_minutes());
            self.ledger.update_visit(&visit).await?;
        }
        Ok(())
    }

    async fn notify_turn_soon(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<u32, WalkInQueueError> {
        let waiting = self
            .ledger
            .waiting_entries(tenant_id, doctor_id, day)
            .await?;
        let ranked = ordering::rank_waiting(&self.policy, waiting);

        let pending: Vec<QueueEntry> = ranked
            .into_iter()
            .take(TURN_SOON_WINDOW)
            .filter(|e| !e.turn_soon_sent)
            .collect();

        let sends = pending.into_iter().map(|entry| async move {
            let Some(phone) = self.patient_phone(tenant_id, entry.patient_id).await else {
                return false;
            };
            if !self.notifier.send_turn_soon(&phone, &entry.queue_label()).await {
                return false;
            }
            match self
                .ledger
                .mark_notified(entry.id, NotificationKind::TurnSoon)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to persist turn-soon flag for {}: {}", entry.id, e);
                    true
                }
            }
        });

        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
        Ok(delivered as u32)
    }

    pub async fn remove_from_queue(
        &self,
        entry_id: Uuid,
        reason: Option<String>,
    ) -> Result<QueueEntry, WalkInQueueError> {
        let entry = self
            .ledger
            .entry(entry_id)
            .await?
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;

        if entry.status != QueueStatus::Waiting {
            return Err(WalkInQueueError::InvalidStatusTransition {
                from: format!("{:?}", entry.status),
                to: format!("{:?}", QueueStatus::Cancelled),
            });
        }

        let cancelled = self
            .ledger
            .compare_and_transition(entry_id, QueueStatus::Waiting, QueueStatus::Cancelled, None)
            .await?;

        if let Some(mut visit) = self.ledger.visit(entry.visit_id).await? {
            visit.status = VisitStatus::Cancelled;
            visit.cancellation_reason = reason;
            self.ledger.update_visit(&visit).await?;
        }

        info!("Removed {} from the queue", cancelled.queue_label());
        Ok(cancelled)
    }

    pub async fn update_priority(
        &self,
        entry_id: Uuid,
        category: PriorityCategory,
    ) -> Result<QueueEntry, WalkInQueueError> {
        let entry = self
            .ledger
            .entry(entry_id)
            .await?
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;

        if entry.status.is_terminal() {
            return Err(WalkInQueueError::InvalidStatusTransition {
                from: format!("{:?}", entry.status),
                to: "priority update".to_string(),
            });
        }

        let score = self.policy.category_score(category);
        self.ledger.write_priority(entry_id, category, score).await?;

        debug!(
            "Priority of {} overridden to {:?} (score {})",
            entry.queue_label(),
            category,
            score
        );
        self.ledger
            .entry(entry_id)
            .await?
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))
    }

    pub async fn update_triage_level(
        &self,
        entry_id: Uuid,
        triage_level: u8,
    ) -> Result<QueueEntry, WalkInQueueError> {
        if !self.policy.is_valid_triage_level(triage_level) {
            return Err(WalkInQueueError::InvalidTriageLevel(triage_level));
        }

        let entry = self
            .ledger
            .entry(entry_id)
            .await?
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;

        if entry.status.is_terminal() {
            return Err(WalkInQueueError::InvalidStatusTransition {
                from: format!("{:?}", entry.status),
                to: "triage update".to_string(),
            });
        }

        // Hold the doctor's critical section for the write and the bulk
        // pass so an in-flight call-next never reads half-updated ranks.
        let lock = self.doctor_lock(entry.doctor_id).await;
        let _guard = lock.lock().await;

        self.ledger.write_triage(entry_id, triage_level).await?;

        self.reprioritize_waiting(entry.tenant_id, entry.doctor_id, entry.service_date)
            .await?;

        let refreshed = self
            .ledger
            .entry(entry_id)
            .await?
            .ok_or(WalkInQueueError::EntryNotFound(entry_id))?;
        Ok(refreshed)
    }

    /// Rewrites the materialised rank columns of every waiting entry for a
    /// doctor. This is the only pass that writes positions and ETAs back
    /// into storage; readers always recompute them.
    async fn reprioritize_waiting(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<(), WalkInQueueError> {
        let waiting = self
            .ledger
            .waiting_entries(tenant_id, doctor_id, day)
            .await?;

        if waiting.is_empty() {
            return Ok(());
        }

        let average = self.estimator.average_consultation_minutes(doctor_id).await?;
        let ranked = ordering::rank_waiting(&self.policy, waiting);

        for (index, entry) in ranked.iter().enumerate() {
            let position = index as i32 + 1;
            let eta = self.estimator.apply_buffer(position, average);
            self.ledger.write_rank(entry.id, position, eta).await?;
        }

        debug!("Reprioritized {} waiting entries for doctor {}", ranked.len(), doctor_id);
        Ok(())
    }

    pub async fn get_live_queue(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<LiveQueueView, WalkInQueueError> {
        let day = Utc::now().date_naive();

        let in_progress = self
            .ledger
            .in_progress_entry(tenant_id, doctor_id, day)
            .await?;
        let waiting = self
            .ledger
            .waiting_entries(tenant_id, doctor_id, day)
            .await?;

        let average = self.estimator.average_wait_today(doctor_id, day).await?;
        let ranked = ordering::rank_waiting(&self.policy, waiting);

        let waiting = ranked
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let position = index as i32 + 1;
                LiveQueueEntry {
                    entry_id: entry.id,
                    patient_id: entry.patient_id,
                    queue_number: entry.queue_label(),
                    priority_category: entry.priority_category,
                    effective_score: self.policy.effective_score(entry),
                    queue_position: position,
                    estimated_wait_minutes: position as i64 * average,
                    checked_in_at: entry.checked_in_at,
                }
            })
            .collect();

        Ok(LiveQueueView {
            doctor_id,
            in_progress,
            waiting,
        })
    }

    pub async fn get_public_display(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<PublicDisplayView, WalkInQueueError> {
        let day = Utc::now().date_naive();
        let mut entries = Vec::new();

        if let Some(current) = self
            .ledger
            .in_progress_entry(tenant_id, doctor_id, day)
            .await?
        {
            entries.push(PublicDisplayEntry {
                first_name: self.display_name(tenant_id, current.patient_id).await,
                queue_number: current.queue_label(),
                label: "IN CONSULTATION".to_string(),
            });
        }

        let waiting = self
            .ledger
            .waiting_entries(tenant_id, doctor_id, day)
            .await?;
        let ranked = ordering::rank_waiting(&self.policy, waiting);

        for (index, entry) in ranked.iter().take(PUBLIC_DISPLAY_LIMIT).enumerate() {
            entries.push(PublicDisplayEntry {
                first_name: self.display_name(tenant_id, entry.patient_id).await,
                queue_number: entry.queue_label(),
                label: if index == 0 { "NEXT" } else { "WAITING" }.to_string(),
            });
        }

        Ok(PublicDisplayView { doctor_id, entries })
    }

    async fn display_name(&self, tenant_id: Uuid, patient_id: Uuid) -> String {
        match self.directory.find_patient(tenant_id, patient_id).await {
            Ok(Some(patient)) => patient.first_name,
            _ => "Patient".to_string(),
        }
    }

    pub async fn queue_stats(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<QueueStatsView, WalkInQueueError> {
        let day = Utc::now().date_naive();

        let waiting_count = self
            .ledger
            .count_waiting(tenant_id, doctor_id, day)
            .await?;
        let waits = self.ledger.completed_waits_on(doctor_id, day).await?;
        let average_wait_minutes_today = self.estimator.average_wait_today(doctor_id, day).await?;
        let average_consultation_minutes = self
            .estimator
            .average_consultation_minutes(doctor_id)
            .await?;

        Ok(QueueStatsView {
            doctor_id,
            waiting_count,
            completed_today: waits.len() as u64,
            average_wait_minutes_today,
            average_consultation_minutes,
        })
    }
}
