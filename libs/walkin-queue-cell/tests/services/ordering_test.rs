use chrono::{Duration, Utc};
use uuid::Uuid;

use walkin_queue_cell::models::PriorityCategory;
use walkin_queue_cell::services::{ordering, PriorityPolicy};

use super::make_entry;

#[test]
fn test_priority_score_tables() {
    let policy = PriorityPolicy::default();

    assert_eq!(policy.category_score(PriorityCategory::Emergency), 100);
    assert_eq!(policy.category_score(PriorityCategory::Urgent), 80);
    assert_eq!(policy.category_score(PriorityCategory::SeniorCitizen), 60);
    assert_eq!(policy.category_score(PriorityCategory::Pregnant), 60);
    assert_eq!(policy.category_score(PriorityCategory::WithChild), 50);
    assert_eq!(policy.category_score(PriorityCategory::Regular), 0);
    assert_eq!(policy.category_score(PriorityCategory::LateArrival), -10);

    assert_eq!(policy.triage_adjustment(Some(1)), 200);
    assert_eq!(policy.triage_adjustment(Some(2)), 150);
    assert_eq!(policy.triage_adjustment(Some(3)), 100);
    assert_eq!(policy.triage_adjustment(Some(4)), 50);
    assert_eq!(policy.triage_adjustment(Some(5)), 25);
    assert_eq!(policy.triage_adjustment(None), 0);
}

#[test]
fn test_higher_score_ranks_first_then_arrival() {
    let policy = PriorityPolicy::default();
    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let base = Utc::now();

    let p1 = make_entry(tenant, branch, doctor, PriorityCategory::Regular, base, 1);
    let p3 = make_entry(
        tenant,
        branch,
        doctor,
        PriorityCategory::Regular,
        base + Duration::minutes(2),
        2,
    );
    let p2 = make_entry(
        tenant,
        branch,
        doctor,
        PriorityCategory::Urgent,
        base + Duration::minutes(5),
        3,
    );

    let ranked = ordering::rank_waiting(&policy, vec![p1.clone(), p3.clone(), p2.clone()]);

    assert_eq!(ranked[0].id, p2.id);
    assert_eq!(ranked[1].id, p1.id);
    assert_eq!(ranked[2].id, p3.id);

    let next = ordering::next_in_line(&policy, &[p1.clone(), p3, p2.clone()]).unwrap();
    assert_eq!(next.id, p2.id);
}

#[test]
fn test_triage_adjustment_folds_into_ranking() {
    let policy = PriorityPolicy::default();
    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let base = Utc::now();

    let urgent = make_entry(tenant, branch, doctor, PriorityCategory::Urgent, base, 1);
    let mut triaged = make_entry(
        tenant,
        branch,
        doctor,
        PriorityCategory::Regular,
        base + Duration::minutes(10),
        2,
    );
    triaged.triage_level = Some(3);

    assert_eq!(policy.effective_score(&urgent), 80);
    assert_eq!(policy.effective_score(&triaged), 100);

    let ranked = ordering::rank_waiting(&policy, vec![urgent.clone(), triaged.clone()]);
    assert_eq!(ranked[0].id, triaged.id);
    assert_eq!(ranked[1].id, urgent.id);
}

#[test]
fn test_order_is_total_and_stable() {
    let policy = PriorityPolicy::default();
    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let base = Utc::now();

    let mut entries = Vec::new();
    for i in 0..6 {
        let category = if i % 2 == 0 {
            PriorityCategory::Regular
        } else {
            PriorityCategory::SeniorCitizen
        };
        entries.push(make_entry(
            tenant,
            branch,
            doctor,
            category,
            base + Duration::seconds(i),
            i as i32 + 1,
        ));
    }

    let forward = ordering::rank_waiting(&policy, entries.clone());
    entries.reverse();
    let backward = ordering::rank_waiting(&policy, entries);

    let forward_ids: Vec<Uuid> = forward.iter().map(|e| e.id).collect();
    let backward_ids: Vec<Uuid> = backward.iter().map(|e| e.id).collect();
    assert_eq!(forward_ids, backward_ids);

    // No two adjacent entries compare equal: same score implies distinct
    // check-in times here, so the order is total.
    for pair in forward.windows(2) {
        assert_ne!(
            ordering::compare_waiting(&policy, &pair[0], &pair[1]),
            std::cmp::Ordering::Equal
        );
    }
}

#[test]
fn test_same_instant_falls_back_to_queue_number() {
    let policy = PriorityPolicy::default();
    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let base = Utc::now();

    let a = make_entry(tenant, branch, doctor, PriorityCategory::Regular, base, 7);
    let b = make_entry(tenant, branch, doctor, PriorityCategory::Regular, base, 4);

    let ranked = ordering::rank_waiting(&policy, vec![a.clone(), b.clone()]);
    assert_eq!(ranked[0].id, b.id);
    assert_eq!(ranked[1].id, a.id);
}

#[test]
fn test_late_arrival_ranks_below_regular() {
    let policy = PriorityPolicy::default();
    let tenant = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let base = Utc::now();

    let late = make_entry(tenant, branch, doctor, PriorityCategory::LateArrival, base, 1);
    let regular = make_entry(
        tenant,
        branch,
        doctor,
        PriorityCategory::Regular,
        base + Duration::minutes(30),
        2,
    );

    let ranked = ordering::rank_waiting(&policy, vec![late.clone(), regular.clone()]);
    assert_eq!(ranked[0].id, regular.id);
    assert_eq!(ranked[1].id, late.id);
}
