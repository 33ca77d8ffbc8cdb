use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WalkInQueueError {
    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Patient {patient_id} already has an active queue entry with this doctor today")]
    AlreadyInQueue { patient_id: Uuid },

    #[error("Invalid triage level {0}, expected 1-5")]
    InvalidTriageLevel(u8),

    #[error("Invalid queue status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Queue entry {entry_id} was expected to be {expected} but is {actual}")]
    StaleStatus {
        entry_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Lost the race for doctor {doctor_id}'s queue after {attempts} attempts")]
    Conflict { doctor_id: Uuid, attempts: u32 },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
