use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use walkin_queue_cell::models::{PriorityCategory, QueueStatus};
use walkin_queue_cell::services::{QueueLedger, SupabaseQueueLedger};
use walkin_queue_cell::WalkInQueueError;

use super::make_entry;

fn supabase_config(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: base_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_service_key: "test-service-key".to_string(),
        sms_gateway_url: String::new(),
        sms_gateway_api_key: String::new(),
        default_consultation_minutes: 25,
        eta_buffer_percent: 15,
    }
}

#[tokio::test]
async fn test_next_queue_number_calls_rpc() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/next_queue_number"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = SupabaseQueueLedger::new(&supabase_config(&server.uri()));
    let number = ledger
        .next_queue_number(Uuid::new_v4(), Uuid::new_v4(), Utc::now().date_naive())
        .await
        .unwrap();

    assert_eq!(number, 7);
}

#[tokio::test]
async fn test_compare_and_transition_returns_updated_row() {
    let server = MockServer::start().await;

    let mut entry = make_entry(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        PriorityCategory::Regular,
        Utc::now(),
        1,
    );
    entry.status = QueueStatus::InProgress;
    entry.called_at = Some(Utc::now());
    entry.room_number = Some("Room 2".to_string());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", entry.id)))
        .and(query_param("status", "eq.WAITING"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([serde_json::to_value(&entry).unwrap()])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ledger = SupabaseQueueLedger::new(&supabase_config(&server.uri()));
    let updated = ledger
        .compare_and_transition(
            entry.id,
            QueueStatus::Waiting,
            QueueStatus::InProgress,
            Some("Room 2".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, entry.id);
    assert_eq!(updated.status, QueueStatus::InProgress);
    assert_eq!(updated.room_number, Some("Room 2".to_string()));
}

#[tokio::test]
async fn test_compare_and_transition_lost_race_is_stale_status() {
    let server = MockServer::start().await;

    let mut entry = make_entry(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        PriorityCategory::Regular,
        Utc::now(),
        1,
    );
    entry.status = QueueStatus::InProgress;

    // The conditional PATCH matches nothing because the status moved.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // The follow-up read shows who won.
    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("id", format!("eq.{}", entry.id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([serde_json::to_value(&entry).unwrap()])),
        )
        .mount(&server)
        .await;

    let ledger = SupabaseQueueLedger::new(&supabase_config(&server.uri()));
    let result = ledger
        .compare_and_transition(
            entry.id,
            QueueStatus::Waiting,
            QueueStatus::InProgress,
            None,
        )
        .await;

    assert_matches!(result.unwrap_err(), WalkInQueueError::StaleStatus { .. });
}

#[tokio::test]
async fn test_compare_and_transition_missing_row_is_not_found() {
    let server = MockServer::start().await;
    let entry_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let ledger = SupabaseQueueLedger::new(&supabase_config(&server.uri()));
    let result = ledger
        .compare_and_transition(entry_id, QueueStatus::Waiting, QueueStatus::Cancelled, None)
        .await;

    assert_matches!(result.unwrap_err(), WalkInQueueError::EntryNotFound(_));
}

#[tokio::test]
async fn test_compare_and_transition_rejects_illegal_transition_locally() {
    // Completed -> InProgress is not in the state machine; no request
    // should ever leave the process.
    let ledger = SupabaseQueueLedger::new(&supabase_config("http://127.0.0.1:9"));
    let result = ledger
        .compare_and_transition(
            Uuid::new_v4(),
            QueueStatus::Completed,
            QueueStatus::InProgress,
            None,
        )
        .await;

    assert_matches!(
        result.unwrap_err(),
        WalkInQueueError::InvalidStatusTransition { .. }
    );
}

#[tokio::test]
async fn test_waiting_entries_filters_and_deserializes() {
    let server = MockServer::start().await;

    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let day = Utc::now().date_naive();

    let a = make_entry(tenant, branch, doctor, PriorityCategory::Regular, Utc::now(), 1);
    let b = make_entry(tenant, branch, doctor, PriorityCategory::Urgent, Utc::now(), 2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/queue_entries"))
        .and(query_param("status", "eq.WAITING"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap(),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = SupabaseQueueLedger::new(&supabase_config(&server.uri()));
    let entries = ledger.waiting_entries(tenant, doctor, day).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, a.id);
    assert_eq!(entries[1].queue_number, 2);
}
