use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::error::WalkInQueueError;
use crate::models::{PriorityCategory, QueueEntry, QueueStatus, VisitRecord};
use crate::services::ledger::{NotificationKind, QueueLedger};

const ENTRIES: &str = "/rest/v1/queue_entries";
const VISITS: &str = "/rest/v1/visits";

fn status_str(status: QueueStatus) -> &'static str {
    match status {
        QueueStatus::Waiting => "WAITING",
        QueueStatus::InProgress => "IN_PROGRESS",
        QueueStatus::Completed => "COMPLETED",
        QueueStatus::Cancelled => "CANCELLED",
    }
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}

/// Queue ledger backed by Supabase PostgREST. Conditional status updates
/// are expressed as a filtered PATCH (`id=eq.X&status=eq.EXPECTED`): an
/// empty representation means the row no longer matched, i.e. another
/// caller won the race. Queue numbers come from a `next_queue_number`
/// Postgres function so concurrent terminals never mint duplicates.
pub struct SupabaseQueueLedger {
    supabase: SupabaseClient,
}

impl SupabaseQueueLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, WalkInQueueError> {
        self.supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))
    }

    fn one_entry(mut rows: Vec<Value>) -> Result<Option<QueueEntry>, WalkInQueueError> {
        if rows.is_empty() {
            return Ok(None);
        }
        let entry: QueueEntry = serde_json::from_value(rows.remove(0))?;
        Ok(Some(entry))
    }
}

#[async_trait]
impl QueueLedger for SupabaseQueueLedger {
    async fn create_entry(&self, entry: QueueEntry) -> Result<QueueEntry, WalkInQueueError> {
        let body = serde_json::to_value(&entry)?;
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, ENTRIES, Some(body), Some(representation_headers()))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;

        Self::one_entry(rows)?.ok_or_else(|| {
            WalkInQueueError::Ledger("queue entry insert returned no representation".to_string())
        })
    }

    async fn entry(&self, entry_id: Uuid) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let path = format!("{}?id=eq.{}", ENTRIES, entry_id);
        let rows: Vec<Value> = self.get(&path).await?;
        Self::one_entry(rows)
    }

    async fn write_priority(
        &self,
        entry_id: Uuid,
        category: PriorityCategory,
        score: i32,
    ) -> Result<(), WalkInQueueError> {
        let path = format!("{}?id=eq.{}", ENTRIES, entry_id);
        let body = json!({
            "priority_category": category,
            "priority_score": score,
        });
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        Ok(())
    }

    async fn write_triage(
        &self,
        entry_id: Uuid,
        triage_level: u8,
    ) -> Result<(), WalkInQueueError> {
        let path = format!("{}?id=eq.{}", ENTRIES, entry_id);
        let body = json!({ "triage_level": triage_level });
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        Ok(())
    }

    async fn next_queue_number(
        &self,
        tenant_id: Uuid,
        branch_id: Uuid,
        day: NaiveDate,
    ) -> Result<i32, WalkInQueueError> {
        let body = json!({
            "p_tenant_id": tenant_id,
            "p_branch_id": branch_id,
            "p_service_date": day,
        });
        let number: i32 = self
            .supabase
            .request(Method::POST, "/rest/v1/rpc/next_queue_number", Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        debug!("Allocated queue number {} for branch {}", number, branch_id);
        Ok(number)
    }

    async fn find_non_terminal_entry(
        &self,
        tenant_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let path = format!(
            "{}?tenant_id=eq.{}&patient_id=eq.{}&doctor_id=eq.{}&service_date=eq.{}&status=in.(WAITING,IN_PROGRESS)&limit=1",
            ENTRIES, tenant_id, patient_id, doctor_id, day
        );
        let rows: Vec<Value> = self.get(&path).await?;
        Self::one_entry(rows)
    }

    async fn count_waiting(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<u64, WalkInQueueError> {
        let entries = self.waiting_entries(tenant_id, doctor_id, day).await?;
        Ok(entries.len() as u64)
    }

    async fn waiting_entries(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<QueueEntry>, WalkInQueueError> {
        let path = format!(
            "{}?tenant_id=eq.{}&doctor_id=eq.{}&service_date=eq.{}&status=eq.WAITING&order=checked_in_at.asc",
            ENTRIES, tenant_id, doctor_id, day
        );
        let rows: Vec<Value> = self.get(&path).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(WalkInQueueError::from))
            .collect()
    }

    async fn in_progress_entry(
        &self,
        tenant_id: Uuid,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<QueueEntry>, WalkInQueueError> {
        let path = format!(
            "{}?tenant_id=eq.{}&doctor_id=eq.{}&service_date=eq.{}&status=eq.IN_PROGRESS&limit=1",
            ENTRIES, tenant_id, doctor_id, day
        );
        let rows: Vec<Value> = self.get(&path).await?;
        Self::one_entry(rows)
    }

    async fn compare_and_transition(
        &self,
        entry_id: Uuid,
        expected: QueueStatus,
        new: QueueStatus,
        room_number: Option<String>,
    ) -> Result<QueueEntry, WalkInQueueError> {
        if !expected.can_transition_to(&new) {
            return Err(WalkInQueueError::InvalidStatusTransition {
                from: format!("{:?}", expected),
                to: format!("{:?}", new),
            });
        }

        let mut body = serde_json::Map::new();
        body.insert("status".to_string(), json!(status_str(new)));
        match new {
            QueueStatus::InProgress => {
                body.insert("called_at".to_string(), json!(Utc::now()));
                if let Some(room) = room_number {
                    body.insert("room_number".to_string(), json!(room));
                }
            }
            QueueStatus::Completed | QueueStatus::Cancelled => {
                body.insert("completed_at".to_string(), json!(Utc::now()));
            }
            QueueStatus::Waiting => {}
        }

        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            ENTRIES,
            entry_id,
            status_str(expected)
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(body)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;

        if let Some(entry) = Self::one_entry(rows)? {
            return Ok(entry);
        }

        // The filter matched nothing: either the row is gone or its status
        // moved underneath us.
        match self.entry(entry_id).await? {
            Some(current) => Err(WalkInQueueError::StaleStatus {
                entry_id,
                expected: format!("{:?}", expected),
                actual: format!("{:?}", current.status),
            }),
            None => Err(WalkInQueueError::EntryNotFound(entry_id)),
        }
    }

    async fn write_rank(
        &self,
        entry_id: Uuid,
        position: i32,
        eta_minutes: i64,
    ) -> Result<(), WalkInQueueError> {
        let path = format!("{}?id=eq.{}", ENTRIES, entry_id);
        let body = json!({
            "queue_position": position,
            "estimated_wait_minutes": eta_minutes,
        });
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        Ok(())
    }

    async fn mark_notified(
        &self,
        entry_id: Uuid,
        kind: NotificationKind,
    ) -> Result<(), WalkInQueueError> {
        let path = format!("{}?id=eq.{}", ENTRIES, entry_id);
        let body = match kind {
            NotificationKind::TurnNow => json!({ "turn_now_sent": true }),
            NotificationKind::TurnSoon => json!({ "turn_soon_sent": true }),
        };
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        Ok(())
    }

    async fn consultation_durations_since(
        &self,
        doctor_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<i64>, WalkInQueueError> {
        let path = format!(
            "{}?doctor_id=eq.{}&status=eq.COMPLETED&completed_at=gte.{}&select=duration_minutes",
            VISITS,
            doctor_id,
            since.to_rfc3339()
        );
        let rows: Vec<Value> = self.get(&path).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row["duration_minutes"].as_i64())
            .collect())
    }

    async fn completed_waits_on(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<i64>, WalkInQueueError> {
        let path = format!(
            "{}?doctor_id=eq.{}&service_date=eq.{}&status=eq.COMPLETED&select=checked_in_at,completed_at",
            ENTRIES, doctor_id, day
        );
        let rows: Vec<Value> = self.get(&path).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let checked_in: DateTime<Utc> =
                    serde_json::from_value(row["checked_in_at"].clone()).ok()?;
                let completed: DateTime<Utc> =
                    serde_json::from_value(row["completed_at"].clone()).ok()?;
                Some((completed - checked_in).num_minutes())
            })
            .collect())
    }

    async fn create_visit(&self, visit: VisitRecord) -> Result<VisitRecord, WalkInQueueError> {
        let body = serde_json::to_value(&visit)?;
        let mut rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, VISITS, Some(body), Some(representation_headers()))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;

        if rows.is_empty() {
            return Err(WalkInQueueError::Ledger(
                "visit insert returned no representation".to_string(),
            ));
        }
        let visit: VisitRecord = serde_json::from_value(rows.remove(0))?;
        Ok(visit)
    }

    async fn visit(&self, visit_id: Uuid) -> Result<Option<VisitRecord>, WalkInQueueError> {
        let path = format!("{}?id=eq.{}", VISITS, visit_id);
        let mut rows: Vec<Value> = self.get(&path).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let visit: VisitRecord = serde_json::from_value(rows.remove(0))?;
        Ok(Some(visit))
    }

    async fn update_visit(&self, visit: &VisitRecord) -> Result<(), WalkInQueueError> {
        let path = format!("{}?id=eq.{}", VISITS, visit.id);
        let body = serde_json::to_value(visit)?;
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(body))
            .await
            .map_err(|e| WalkInQueueError::Ledger(e.to_string()))?;
        Ok(())
    }
}
