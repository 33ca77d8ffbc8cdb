use chrono::Utc;
use uuid::Uuid;

use walkin_queue_cell::services::WaitTimeEstimator;

use super::QueueTestContext;

#[tokio::test]
async fn test_average_defaults_without_history() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);
    let doctor = Uuid::new_v4();

    let average = estimator.average_consultation_minutes(doctor).await.unwrap();
    assert_eq!(average, 25);

    // Position 1 with the default: ceil(25 * 1.15) = 29.
    let eta = estimator.estimated_wait_minutes(1, doctor).await.unwrap();
    assert_eq!(eta, 29);
}

#[tokio::test]
async fn test_average_is_mean_of_completed_durations() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);
    let doctor = ctx.add_doctor().await;

    ctx.seed_completed_visit(doctor, 10).await;
    ctx.seed_completed_visit(doctor, 20).await;
    ctx.seed_completed_visit(doctor, 30).await;

    let average = estimator.average_consultation_minutes(doctor).await.unwrap();
    assert_eq!(average, 20);

    // ceil(3 * 20 * 1.15) = 69.
    let eta = estimator.estimated_wait_minutes(3, doctor).await.unwrap();
    assert_eq!(eta, 69);
}

#[tokio::test]
async fn test_mean_rounds_to_whole_minutes() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);
    let doctor = ctx.add_doctor().await;

    ctx.seed_completed_visit(doctor, 20).await;
    ctx.seed_completed_visit(doctor, 21).await;

    let average = estimator.average_consultation_minutes(doctor).await.unwrap();
    assert_eq!(average, 21);
}

#[tokio::test]
async fn test_buffer_rounds_up() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);

    // 2 * 25 * 1.15 = 57.5, which must round up, never down.
    assert_eq!(estimator.apply_buffer(2, 25), 58);
    assert_eq!(estimator.apply_buffer(1, 20), 23);
    assert_eq!(estimator.apply_buffer(4, 10), 46);
}

#[tokio::test]
async fn test_todays_average_wait_is_separate_from_consultation_average() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);
    let doctor = ctx.add_doctor().await;
    let today = Utc::now().date_naive();

    // Thirty-day history says 15-minute consultations; today's completed
    // entries waited 60 minutes each. The two windows must not bleed into
    // each other.
    ctx.seed_completed_visit(doctor, 15).await;
    ctx.seed_completed_entry(doctor, 60).await;

    let consultation = estimator.average_consultation_minutes(doctor).await.unwrap();
    let wait_today = estimator.average_wait_today(doctor, today).await.unwrap();
    assert_eq!(consultation, 15);
    assert_eq!(wait_today, 60);

    // The live figure multiplies position by today's average, unbuffered.
    let live = estimator.live_wait_minutes(2, doctor, today).await.unwrap();
    assert_eq!(live, 120);
}

#[tokio::test]
async fn test_todays_average_defaults_without_completions() {
    let ctx = QueueTestContext::new();
    let estimator = WaitTimeEstimator::new(ctx.ledger.clone(), 25, 15);
    let doctor = Uuid::new_v4();
    let today = Utc::now().date_naive();

    let wait_today = estimator.average_wait_today(doctor, today).await.unwrap();
    assert_eq!(wait_today, 25);
}
