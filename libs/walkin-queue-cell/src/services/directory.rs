use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::error::WalkInQueueError;
use crate::models::{Doctor, Patient};

/// Patient/doctor identity lookup. The queue only needs existence, the
/// clinician role flag and a phone number; record management lives in a
/// different system.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_patient(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Patient>, WalkInQueueError>;

    async fn find_doctor(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Doctor>, WalkInQueueError>;
}

pub struct SupabaseDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_one(&self, path: &str) -> Result<Option<Value>, WalkInQueueError> {
        let mut rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn find_patient(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Patient>, WalkInQueueError> {
        let path = format!(
            "/rest/v1/patients?tenant_id=eq.{}&id=eq.{}&select=id,first_name,last_name,phone_number",
            tenant_id, patient_id
        );
        match self.fetch_one(&path).await? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn find_doctor(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Doctor>, WalkInQueueError> {
        let path = format!(
            "/rest/v1/doctors?tenant_id=eq.{}&id=eq.{}&select=id,first_name,last_name,role,is_active",
            tenant_id, doctor_id
        );
        match self.fetch_one(&path).await? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }
}

/// Directory over in-process maps, for tests and single-node setups.
#[derive(Default)]
pub struct InMemoryDirectory {
    patients: RwLock<HashMap<Uuid, Patient>>,
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_patient(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn add_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_patient(
        &self,
        _tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Patient>, WalkInQueueError> {
        Ok(self.patients.read().await.get(&patient_id).cloned())
    }

    async fn find_doctor(
        &self,
        _tenant_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Doctor>, WalkInQueueError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }
}
