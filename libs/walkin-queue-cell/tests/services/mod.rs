use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use walkin_queue_cell::models::*;
use walkin_queue_cell::services::*;

/// Notifier that records every dispatch and can be flipped into a failing
/// mode to exercise the fire-and-forget contract.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    async fn record(&self, message: String) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().unwrap().push(message);
        true
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn send_queue_registered(
        &self,
        phone: &str,
        _patient_name: &str,
        queue_number: &str,
        eta_minutes: i64,
    ) -> bool {
        self.record(format!("registered:{}:{}:{}", phone, queue_number, eta_minutes))
            .await
    }

    async fn send_turn_now(&self, phone: &str, room_label: &str) -> bool {
        self.record(format!("turn_now:{}:{}", phone, room_label)).await
    }

    async fn send_turn_soon(&self, phone: &str, queue_number: &str) -> bool {
        self.record(format!("turn_soon:{}:{}", phone, queue_number)).await
    }
}

/// In-memory wiring of the whole cell for integration tests.
pub struct QueueTestContext {
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub ledger: Arc<InMemoryQueueLedger>,
    pub directory: Arc<InMemoryDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<WalkInQueueService>,
}

impl QueueTestContext {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryQueueLedger::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let estimator = WaitTimeEstimator::new(ledger.clone(), 25, 15);
        let service = Arc::new(WalkInQueueService::new(
            ledger.clone(),
            directory.clone(),
            notifier.clone(),
            PriorityPolicy::default(),
            estimator,
        ));

        Self {
            tenant_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            ledger,
            directory,
            notifier,
            service,
        }
    }

    pub async fn add_patient(&self, first_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.directory
            .add_patient(Patient {
                id,
                first_name: first_name.to_string(),
                last_name: "Test".to_string(),
                phone_number: Some(format!("+35380000{}", &id.simple().to_string()[..4])),
            })
            .await;
        id
    }

    pub async fn add_patient_without_phone(&self, first_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.directory
            .add_patient(Patient {
                id,
                first_name: first_name.to_string(),
                last_name: "Test".to_string(),
                phone_number: None,
            })
            .await;
        id
    }

    pub async fn add_doctor(&self) -> Uuid {
        self.add_doctor_with_role("doctor").await
    }

    pub async fn add_doctor_with_role(&self, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.directory
            .add_doctor(Doctor {
                id,
                first_name: "Aoife".to_string(),
                last_name: "Byrne".to_string(),
                role: role.to_string(),
                is_active: true,
            })
            .await;
        id
    }

    pub async fn check_in(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        category: Option<PriorityCategory>,
    ) -> CheckInResponse {
        self.service
            .add_to_queue(CheckInRequest {
                tenant_id: self.tenant_id,
                branch_id: self.branch_id,
                patient_id,
                doctor_id,
                priority_category: category,
                complaint: None,
            })
            .await
            .expect("check-in should succeed")
    }

    /// Seed a completed visit so the 30-day consultation average has data.
    pub async fn seed_completed_visit(&self, doctor_id: Uuid, duration_minutes: i64) {
        let now = Utc::now();
        let visit = VisitRecord {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            patient_id: Uuid::new_v4(),
            doctor_id,
            queue_entry_id: Uuid::new_v4(),
            status: VisitStatus::Completed,
            complaint: None,
            cancellation_reason: None,
            checked_in_at: now - Duration::minutes(duration_minutes + 10),
            started_at: Some(now - Duration::minutes(duration_minutes)),
            completed_at: Some(now),
            duration_minutes: Some(duration_minutes),
        };
        self.ledger
            .create_visit(visit)
            .await
            .expect("visit seed should succeed");
    }

    /// Seed an entry completed today so the live dashboard average has data.
    pub async fn seed_completed_entry(&self, doctor_id: Uuid, wait_minutes: i64) {
        let now = Utc::now();
        let entry = make_entry(
            self.tenant_id,
            self.branch_id,
            doctor_id,
            PriorityCategory::Regular,
            now - Duration::minutes(wait_minutes),
            0,
        );
        let entry = QueueEntry {
            status: QueueStatus::Completed,
            completed_at: Some(now),
            ..entry
        };
        self.ledger
            .create_entry(entry)
            .await
            .expect("entry seed should succeed");
    }

    pub async fn waiting_for(&self, doctor_id: Uuid) -> Vec<QueueEntry> {
        self.ledger
            .waiting_entries(self.tenant_id, doctor_id, Utc::now().date_naive())
            .await
            .expect("waiting query should succeed")
    }

    pub async fn in_progress_for(&self, doctor_id: Uuid) -> Option<QueueEntry> {
        self.ledger
            .in_progress_entry(self.tenant_id, doctor_id, Utc::now().date_naive())
            .await
            .expect("in-progress query should succeed")
    }
}

/// Bare waiting entry for ordering-level tests that bypass the service.
pub fn make_entry(
    tenant_id: Uuid,
    branch_id: Uuid,
    doctor_id: Uuid,
    category: PriorityCategory,
    checked_in_at: DateTime<Utc>,
    queue_number: i32,
) -> QueueEntry {
    let policy = PriorityPolicy::default();
    QueueEntry {
        id: Uuid::new_v4(),
        tenant_id,
        branch_id,
        patient_id: Uuid::new_v4(),
        doctor_id,
        visit_id: Uuid::new_v4(),
        service_date: checked_in_at.date_naive(),
        queue_number,
        priority_category: category,
        priority_score: policy.category_score(category),
        triage_level: None,
        queue_position: 0,
        estimated_wait_minutes: 0,
        status: QueueStatus::Waiting,
        room_number: None,
        checked_in_at,
        called_at: None,
        completed_at: None,
        turn_now_sent: false,
        turn_soon_sent: false,
    }
}

mod estimator_test;
mod ordering_test;
mod supabase_ledger_test;
