// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Range queries: owner view, public listing, and the unmaterialized preview.

use std::collections::BTreeSet;
use studio_sessions::error::AppError;
use studio_sessions::models::{OccurrenceStatus, RecurrenceKind, RuleSpec, SessionOccurrence};
use studio_sessions::services::ScheduleService;

mod common;
use common::{at, test_service};

/// coach-a: public weekly Mon/Wed class plus a private Friday session.
/// coach-b: public daily class. Both run Aug 5 through Aug 18 2024.
async fn seed_rules(service: &ScheduleService) -> (String, String, String) {
    let now = at(2024, 8, 1, 0);

    let mut weekly = RuleSpec::named("Fundamentals", at(2024, 8, 5, 10), RecurrenceKind::Weekly);
    weekly.selected_weekdays = BTreeSet::from([1, 3]);
    weekly.recurrence_end = Some(at(2024, 8, 18, 23));
    let weekly = service.create_rule("coach-a", weekly, now).await.unwrap();

    let mut private = RuleSpec::named("1:1 Strength", at(2024, 8, 9, 8), RecurrenceKind::Weekly);
    private.is_private = true;
    private.recurrence_end = Some(at(2024, 8, 18, 23));
    private.intake_details = Some(serde_json::json!({"injury": "left knee"}));
    let private = service.create_rule("coach-a", private, now).await.unwrap();

    let mut daily = RuleSpec::named("Mobility", at(2024, 8, 5, 7), RecurrenceKind::Daily);
    daily.recurrence_end = Some(at(2024, 8, 18, 23));
    let daily = service.create_rule("coach-b", daily, now).await.unwrap();

    (weekly.rule.id, private.rule.id, daily.rule.id)
}

#[tokio::test]
async fn test_owner_listing_includes_private_and_intake() {
    let (service, _store) = test_service();
    seed_rules(&service).await;

    let views = service
        .list_occurrences_for_owner("coach-a", at(2024, 8, 5, 0), at(2024, 8, 18, 23))
        .await
        .unwrap();
    // Four Mon/Wed classes plus two Fridays.
    assert_eq!(views.len(), 6);
    assert!(views.windows(2).all(|w| w[0].start <= w[1].start));
    assert!(views.iter().all(|v| v.owner_id == "coach-a"));

    let private: Vec<_> = views.iter().filter(|v| v.is_private).collect();
    assert_eq!(private.len(), 2);
    assert_eq!(
        private[0].intake_details,
        Some(serde_json::json!({"injury": "left knee"}))
    );
}

#[tokio::test]
async fn test_public_listing_groups_by_owner_and_hides_private() {
    let (service, _store) = test_service();
    seed_rules(&service).await;

    let groups = service
        .list_public_occurrences(at(2024, 8, 5, 0), at(2024, 8, 18, 23))
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].owner_name, "Alex Rivera");
    assert_eq!(groups[0].occurrences.len(), 4);
    assert_eq!(groups[1].owner_name, "Blake Chen");
    assert_eq!(groups[1].occurrences.len(), 14);

    for group in &groups {
        for view in &group.occurrences {
            assert!(!view.is_private);
            assert!(view.intake_details.is_none());
            assert_eq!(view.owner_id, group.owner_id);
        }
    }
}

#[tokio::test]
async fn test_listing_window_is_inclusive_and_skips_cancelled() {
    let (service, _store) = test_service();
    let (weekly_id, _, _) = seed_rules(&service).await;

    // Exactly one instant: Wed Aug 7 10:00.
    let views = service
        .list_occurrences_for_owner("coach-a", at(2024, 8, 7, 10), at(2024, 8, 7, 10))
        .await
        .unwrap();
    assert_eq!(views.len(), 1);

    service
        .cancel_occurrence("coach-a", &views[0].id, at(2024, 8, 1, 1))
        .await
        .unwrap();
    let views = service
        .list_occurrences_for_owner("coach-a", at(2024, 8, 7, 10), at(2024, 8, 7, 10))
        .await
        .unwrap();
    assert!(views.is_empty());

    // The rule's own listing still shows the cancelled row.
    let all = service
        .list_rule_occurrences("coach-a", &weekly_id)
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(
        all.iter()
            .filter(|o| o.status == OccurrenceStatus::Cancelled)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_inverted_window_is_rejected() {
    let (service, _store) = test_service();

    let err = service
        .list_public_occurrences(at(2024, 8, 10, 0), at(2024, 8, 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_preview_matches_materialized_schedule() {
    let (service, _store) = test_service();
    seed_rules(&service).await;

    let start = at(2024, 8, 4, 0);
    let end = at(2024, 8, 19, 0);
    let listed = service.list_public_occurrences(start, end).await.unwrap();
    let preview = service
        .preview_public_occurrences(start, end, at(2024, 8, 1, 0))
        .await
        .unwrap();

    assert_eq!(listed.len(), preview.len());
    for (l, p) in listed.iter().zip(&preview) {
        assert_eq!(l.owner_id, p.owner_id);
        let listed_ids: Vec<_> = l.occurrences.iter().map(|o| (&o.id, o.start, o.end)).collect();
        let preview_ids: Vec<_> = p.occurrences.iter().map(|o| (&o.id, o.start, o.end)).collect();
        assert_eq!(listed_ids, preview_ids);
    }
}

#[tokio::test]
async fn test_preview_rejects_wide_window() {
    let (service, _store) = test_service();

    let err = service
        .preview_public_occurrences(at(2024, 1, 1, 0), at(2024, 6, 1, 0), at(2024, 1, 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_owner_gets_placeholder_name() {
    let (service, _store) = test_service();
    service
        .create_rule(
            "coach-z",
            RuleSpec::named("Drop-in", at(2024, 8, 6, 19), RecurrenceKind::None),
            at(2024, 8, 1, 0),
        )
        .await
        .unwrap();

    let groups = service
        .list_public_occurrences(at(2024, 8, 6, 0), at(2024, 8, 7, 0))
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].owner_name, "Unknown");
}

#[tokio::test]
async fn test_past_single_session_absent_from_later_preview() {
    let (service, _store) = test_service();
    service
        .create_rule(
            "coach-a",
            RuleSpec::named("Assessment", at(2024, 8, 5, 10), RecurrenceKind::None),
            at(2024, 8, 1, 0),
        )
        .await
        .unwrap();

    let september = (at(2024, 9, 1, 0), at(2024, 9, 30, 0));
    let preview = service
        .preview_public_occurrences(september.0, september.1, at(2024, 9, 1, 0))
        .await
        .unwrap();
    let listed = service
        .list_public_occurrences(september.0, september.1)
        .await
        .unwrap();
    assert!(preview.is_empty());
    assert!(listed.is_empty());

    let august = service
        .preview_public_occurrences(at(2024, 8, 1, 0), at(2024, 8, 31, 0), at(2024, 9, 1, 0))
        .await
        .unwrap();
    assert_eq!(august.len(), 1);
    assert_eq!(august[0].occurrences[0].start, at(2024, 8, 5, 10));
}

#[tokio::test]
async fn test_preview_keeps_individually_cancelled_instant() {
    let (service, _store) = test_service();
    let mut spec = RuleSpec::named("Mobility", at(2024, 8, 5, 7), RecurrenceKind::Daily);
    spec.recurrence_end = Some(at(2024, 8, 7, 23));
    let change = service
        .create_rule("coach-b", spec, at(2024, 8, 1, 0))
        .await
        .unwrap();

    let id = SessionOccurrence::id_for(&change.rule.id, at(2024, 8, 6, 7));
    service
        .cancel_occurrence("coach-b", &id, at(2024, 8, 2, 0))
        .await
        .unwrap();

    let window = (at(2024, 8, 5, 0), at(2024, 8, 7, 23));
    let listed = service
        .list_public_occurrences(window.0, window.1)
        .await
        .unwrap();
    assert_eq!(listed[0].occurrences.len(), 2);
    assert!(listed[0].occurrences.iter().all(|o| o.start != at(2024, 8, 6, 7)));

    let preview = service
        .preview_public_occurrences(window.0, window.1, at(2024, 8, 2, 0))
        .await
        .unwrap();
    assert_eq!(preview[0].occurrences.len(), 3);
    assert!(preview[0].occurrences.iter().any(|o| o.start == at(2024, 8, 6, 7)));
}
