use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::WalkInQueueError;
use crate::services::ledger::QueueLedger;

const HISTORY_WINDOW_DAYS: i64 = 30;

/// Turns a queue position into minutes of expected waiting. Two averaging
/// windows are in play: the trailing 30-day consultation average feeds the
/// buffered check-in estimate, while the live dashboard uses the mean wait
/// of entries completed today.
pub struct WaitTimeEstimator {
    ledger: Arc<dyn QueueLedger>,
    default_minutes: i64,
    buffer_percent: i64,
}

impl WaitTimeEstimator {
    pub fn new(ledger: Arc<dyn QueueLedger>, default_minutes: i64, buffer_percent: i64) -> Self {
        Self {
            ledger,
            default_minutes,
            buffer_percent,
        }
    }

    fn mean_or_default(&self, samples: &[i64]) -> i64 {
        if samples.is_empty() {
            return self.default_minutes;
        }
        let total: i64 = samples.iter().sum();
        (total as f64 / samples.len() as f64).round() as i64
    }

    /// Mean realized consultation duration for the doctor over the trailing
    /// 30 days, in whole minutes.
    pub async fn average_consultation_minutes(
        &self,
        doctor_id: Uuid,
    ) -> Result<i64, WalkInQueueError> {
        let since = Utc::now() - Duration::days(HISTORY_WINDOW_DAYS);
        let durations = self
            .ledger
            .consultation_durations_since(doctor_id, since)
            .await?;
        Ok(self.mean_or_default(&durations))
    }

    /// Check-in estimate: position times the 30-day average, padded by the
    /// configured buffer and rounded up.
    pub async fn estimated_wait_minutes(
        &self,
        position: i32,
        doctor_id: Uuid,
    ) -> Result<i64, WalkInQueueError> {
        let average = self.average_consultation_minutes(doctor_id).await?;
        Ok(self.apply_buffer(position, average))
    }

    pub fn apply_buffer(&self, position: i32, average_minutes: i64) -> i64 {
        let factor = 1.0 + self.buffer_percent as f64 / 100.0;
        (position as f64 * average_minutes as f64 * factor).ceil() as i64
    }

    /// Mean completed wait (check-in to completion) among today's finished
    /// entries for the doctor.
    pub async fn average_wait_today(
        &self,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<i64, WalkInQueueError> {
        let waits = self.ledger.completed_waits_on(doctor_id, day).await?;
        Ok(self.mean_or_default(&waits))
    }

    /// Dashboard estimate: position times today's average wait, unbuffered.
    pub async fn live_wait_minutes(
        &self,
        position: i32,
        doctor_id: Uuid,
        day: NaiveDate,
    ) -> Result<i64, WalkInQueueError> {
        let average = self.average_wait_today(doctor_id, day).await?;
        Ok(position as i64 * average)
    }
}
