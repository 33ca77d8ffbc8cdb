use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityCategory {
    Emergency,
    Urgent,
    SeniorCitizen,
    Pregnant,
    WithChild,
    Regular,
    LateArrival,
}

impl Default for PriorityCategory {
    fn default() -> Self {
        PriorityCategory::Regular
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }

    pub fn can_transition_to(&self, target: &QueueStatus) -> bool {
        use QueueStatus::*;
        match (self, target) {
            (Waiting, InProgress) => true,
            (InProgress, Completed) => true,
            (Waiting, Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    CheckedIn,
    InConsultation,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub visit_id: Uuid,
    pub service_date: NaiveDate,
    pub queue_number: i32,
    pub priority_category: PriorityCategory,
    pub priority_score: i32,
    pub triage_level: Option<u8>,
    pub queue_position: i32,
    pub estimated_wait_minutes: i64,
    pub status: QueueStatus,
    pub room_number: Option<String>,
    pub checked_in_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub turn_now_sent: bool,
    pub turn_soon_sent: bool,
}

impl QueueEntry {
    /// Human-facing ticket label, reset daily per branch.
    pub fn queue_label(&self) -> String {
        format!("W-{:03}", self.queue_number)
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub queue_entry_id: Uuid,
    pub status: VisitStatus,
    pub complaint: Option<String>,
    pub cancellation_reason: Option<String>,
    pub checked_in_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
}

impl Doctor {
    pub fn is_clinician(&self) -> bool {
        self.is_active && matches!(self.role.as_str(), "doctor" | "consultant" | "registrar")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub tenant_id: Uuid,
    pub branch_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub priority_category: Option<PriorityCategory>,
    pub complaint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub entry_id: Uuid,
    pub visit_id: Uuid,
    pub queue_number: String,
    pub queue_position: i32,
    pub estimated_wait_minutes: i64,
    pub notification_sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNextRequest {
    pub tenant_id: Uuid,
    pub room_number: Option<String>,
}

/// Result of a call-next cycle. `called` is None when the queue is empty,
/// which is a normal outcome rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNextOutcome {
    pub called: Option<QueueEntry>,
    pub completed_entry_id: Option<Uuid>,
    pub turn_now_sent: bool,
    pub turn_soon_notified: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelEntryRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePriorityRequest {
    pub priority_category: PriorityCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTriageRequest {
    pub triage_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQueueEntry {
    pub entry_id: Uuid,
    pub patient_id: Uuid,
    pub queue_number: String,
    pub priority_category: PriorityCategory,
    pub effective_score: i32,
    pub queue_position: i32,
    pub estimated_wait_minutes: i64,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQueueView {
    pub doctor_id: Uuid,
    pub in_progress: Option<QueueEntry>,
    pub waiting: Vec<LiveQueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDisplayEntry {
    pub first_name: String,
    pub queue_number: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDisplayView {
    pub doctor_id: Uuid,
    pub entries: Vec<PublicDisplayEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsView {
    pub doctor_id: Uuid,
    pub waiting_count: u64,
    pub completed_today: u64,
    pub average_wait_minutes_today: i64,
    pub average_consultation_minutes: i64,
}
