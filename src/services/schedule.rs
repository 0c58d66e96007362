// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schedule service: rule lifecycle, occurrence status, and range queries.
//!
//! Owner-scoped operations treat a rule or occurrence belonging to another
//! coach exactly like a missing one (`NotFound`).

use crate::db::{OccurrenceQuery, RuleFilter, ScheduleStore};
use crate::error::{AppError, Result};
use crate::models::{
    OccurrenceStatus, OccurrenceView, OwnerSchedule, RecurrenceRule, RuleSpec, SessionOccurrence,
};
use crate::services::materialize::Materializer;
use crate::services::recurrence::expand;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use validator::Validate;

/// Widest window accepted by the unmaterialized preview.
pub const MAX_PREVIEW_WINDOW_DAYS: i64 = 92;

const UNKNOWN_OWNER: &str = "Unknown";

/// Outcome of creating or updating a rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleChange {
    pub rule: RecurrenceRule,
    pub occurrences_created: usize,
    pub occurrences_removed: usize,
}

/// Outcome of a cancel request on a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub modified_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub rules_processed: usize,
    pub occurrences_created: usize,
    pub failed_rule_ids: Vec<String>,
}

/// Entry point for every scheduling operation exposed to the HTTP layer.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    materializer: Materializer,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, materializer: Materializer) -> Self {
        Self {
            store,
            materializer,
        }
    }

    pub fn store(&self) -> &dyn ScheduleStore {
        self.store.as_ref()
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    // ─── Rule Lifecycle ──────────────────────────────────────────

    /// Validate, persist, and materialize a new rule.
    pub async fn create_rule(
        &self,
        owner_id: &str,
        spec: RuleSpec,
        now: DateTime<Utc>,
    ) -> Result<RuleChange> {
        spec.validate()?;

        let rule = RecurrenceRule::from_spec(uuid::Uuid::new_v4().to_string(), owner_id, spec, now);
        self.store.put_rule(&rule).await?;

        let outcome = self
            .materializer
            .materialize(self.store(), &rule, now)
            .await?;

        tracing::info!(
            rule_id = %rule.id,
            owner_id,
            kind = ?rule.recurrence_kind,
            occurrences = outcome.inserted,
            "Created recurrence rule"
        );

        Ok(RuleChange {
            rule,
            occurrences_created: outcome.inserted,
            occurrences_removed: 0,
        })
    }

    /// Replace a rule and regenerate its future occurrences.
    ///
    /// Future pending rows are dropped and re-materialized from `now`.
    /// Cancelled and completed rows are kept, so a regenerated instant that
    /// was already cancelled stays cancelled.
    pub async fn update_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        spec: RuleSpec,
        now: DateTime<Utc>,
    ) -> Result<RuleChange> {
        spec.validate()?;

        let mut rule = self.owned_rule(owner_id, rule_id).await?;
        rule.apply_spec(spec, now);
        self.store.put_rule(&rule).await?;

        let removed = self
            .store
            .delete_rule_occurrences(rule_id, now, true)
            .await?;
        let outcome = self
            .materializer
            .materialize_from(self.store(), &rule, now, now)
            .await?;

        tracing::info!(
            rule_id,
            owner_id,
            removed,
            created = outcome.inserted,
            "Updated recurrence rule"
        );

        Ok(RuleChange {
            rule,
            occurrences_created: outcome.inserted,
            occurrences_removed: removed,
        })
    }

    /// Remove a rule and its occurrences with `start >= now`.
    ///
    /// Past occurrences stay as history whatever their status.
    pub async fn delete_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.owned_rule(owner_id, rule_id).await?;

        // Occurrences go first so a failed call leaves the rule in place to retry.
        let removed = self
            .store
            .delete_rule_occurrences(rule_id, now, false)
            .await?;
        self.store.delete_rule(rule_id).await?;

        tracing::info!(rule_id, owner_id, removed, "Deleted recurrence rule");
        Ok(removed)
    }

    /// Exclude one date from a recurring rule and cancel its occurrence.
    ///
    /// Returns the number of occurrences newly cancelled.
    pub async fn cancel_rule_instance(
        &self,
        owner_id: &str,
        rule_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut rule = self.owned_rule(owner_id, rule_id).await?;

        if rule.cancelled_exceptions.insert(date) {
            rule.updated_at = now;
            self.store.put_rule(&rule).await?;
        }

        let mut cancelled = 0;
        for occurrence in self.store.list_rule_occurrences(rule_id).await? {
            if occurrence.start.date_naive() != date {
                continue;
            }
            if let Some(OccurrenceStatus::Pending) = self
                .store
                .transition_occurrence(&occurrence.id, OccurrenceStatus::Cancelled, now)
                .await?
            {
                cancelled += 1;
            }
        }

        tracing::info!(rule_id, owner_id, %date, cancelled, "Cancelled rule instance");
        Ok(cancelled)
    }

    /// Re-run materialization for every stored rule.
    ///
    /// Safe to repeat: existing `(rule_id, start)` rows are skipped. A rule
    /// that fails is logged and reported, and the remaining rules still run.
    pub async fn backfill_rules(&self, now: DateTime<Utc>) -> Result<BackfillReport> {
        let rules = self
            .store
            .list_rules(&RuleFilter {
                owner_id: None,
                include_private: true,
            })
            .await?;

        let mut report = BackfillReport::default();
        for rule in &rules {
            match self.materializer.materialize(self.store(), rule, now).await {
                Ok(outcome) => {
                    report.rules_processed += 1;
                    report.occurrences_created += outcome.inserted;
                }
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Backfill failed for rule");
                    report.failed_rule_ids.push(rule.id.clone());
                }
            }
        }

        tracing::info!(
            rules = report.rules_processed,
            created = report.occurrences_created,
            failed = report.failed_rule_ids.len(),
            "Backfill complete"
        );
        Ok(report)
    }

    // ─── Occurrence Status ───────────────────────────────────────

    /// Cancel a pending occurrence. Cancelling twice is a no-op; cancelling a
    /// completed occurrence fails with `InvalidTransition`.
    pub async fn cancel_occurrence(
        &self,
        owner_id: &str,
        occurrence_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome> {
        let not_found = || AppError::NotFound(format!("Occurrence {} not found", occurrence_id));

        let occurrence = self
            .store
            .get_occurrence(occurrence_id)
            .await?
            .filter(|o| o.owner_id == owner_id)
            .ok_or_else(not_found)?;

        match self
            .store
            .transition_occurrence(&occurrence.id, OccurrenceStatus::Cancelled, now)
            .await?
        {
            Some(OccurrenceStatus::Pending) => {
                tracing::info!(occurrence_id, owner_id, "Cancelled occurrence");
                Ok(CancelOutcome::Cancelled)
            }
            Some(OccurrenceStatus::Cancelled) => {
                tracing::debug!(occurrence_id, "Occurrence already cancelled");
                Ok(CancelOutcome::AlreadyCancelled)
            }
            Some(OccurrenceStatus::Completed) => {
                tracing::warn!(occurrence_id, "Refused to cancel completed occurrence");
                Err(AppError::InvalidTransition(format!(
                    "Occurrence {} is already completed",
                    occurrence_id
                )))
            }
            None => Err(not_found()),
        }
    }

    /// Advance every pending occurrence that ended before `now` to completed.
    pub async fn sweep_completed(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let modified_count = self.store.complete_expired(now).await?;
        tracing::info!(modified_count, "Completion sweep finished");
        Ok(SweepReport { modified_count })
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Materialized, non-cancelled occurrences starting in `[start, end]`,
    /// ascending, enriched with owner display names.
    pub async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        owner_id: Option<&str>,
        include_private: bool,
    ) -> Result<Vec<OccurrenceView>> {
        validate_window(start, end)?;

        let rows = self
            .store
            .query_occurrences(&OccurrenceQuery {
                start,
                end,
                owner_id: owner_id.map(str::to_string),
                include_private,
                include_cancelled: false,
            })
            .await?;

        self.enrich(&rows).await
    }

    /// Owner-facing listing, private occurrences included.
    pub async fn list_occurrences_for_owner(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>> {
        self.query(start, end, Some(owner_id), true).await
    }

    /// Public listing grouped by owner, private occurrences excluded.
    pub async fn list_public_occurrences(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OwnerSchedule>> {
        let views = self.query(start, end, None, false).await?;
        Ok(group_by_owner(
            views.into_iter().map(OccurrenceView::into_public),
        ))
    }

    /// Every materialized occurrence of one rule, any status.
    pub async fn list_rule_occurrences(
        &self,
        owner_id: &str,
        rule_id: &str,
    ) -> Result<Vec<OccurrenceView>> {
        self.owned_rule(owner_id, rule_id).await?;
        let rows = self.store.list_rule_occurrences(rule_id).await?;
        self.enrich(&rows).await
    }

    /// Public schedule computed from rules alone, without touching the
    /// occurrence store. Uses the same expansion as materialization.
    ///
    /// Only dates excluded on the rule itself are omitted. An occurrence
    /// cancelled individually with [`Self::cancel_occurrence`] still appears
    /// here, while the materialized listing hides it.
    pub async fn preview_public_occurrences(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OwnerSchedule>> {
        validate_window(start, end)?;
        if end - start > Duration::days(MAX_PREVIEW_WINDOW_DAYS) {
            return Err(AppError::Validation(format!(
                "Preview window must not exceed {} days",
                MAX_PREVIEW_WINDOW_DAYS
            )));
        }

        let rules = self
            .store
            .list_rules(&RuleFilter {
                owner_id: None,
                include_private: false,
            })
            .await?;

        let mut durations: HashMap<Option<String>, Duration> = HashMap::new();
        let mut virtual_rows = Vec::new();
        for rule in &rules {
            let duration = match durations.get(&rule.template_id) {
                Some(duration) => *duration,
                None => {
                    let duration = self.materializer.duration_for(self.store(), rule).await?;
                    durations.insert(rule.template_id.clone(), duration);
                    duration
                }
            };

            virtual_rows.extend(
                expand(rule, start, end)
                    .into_iter()
                    .map(|instant| SessionOccurrence::from_rule(rule, instant, duration, now)),
            );
        }
        virtual_rows.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        tracing::debug!(
            rules = rules.len(),
            occurrences = virtual_rows.len(),
            "Computed schedule preview"
        );

        let views = self.enrich(&virtual_rows).await?;
        Ok(group_by_owner(
            views.into_iter().map(OccurrenceView::into_public),
        ))
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn owned_rule(&self, owner_id: &str, rule_id: &str) -> Result<RecurrenceRule> {
        self.store
            .get_rule(rule_id)
            .await?
            .filter(|rule| rule.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Rule {} not found", rule_id)))
    }

    async fn enrich(&self, rows: &[SessionOccurrence]) -> Result<Vec<OccurrenceView>> {
        let mut owner_ids: Vec<String> = rows.iter().map(|o| o.owner_id.clone()).collect();
        owner_ids.sort();
        owner_ids.dedup();

        let names = if owner_ids.is_empty() {
            HashMap::new()
        } else {
            self.store.coach_names(&owner_ids).await?
        };

        Ok(rows
            .iter()
            .map(|o| {
                let name = names
                    .get(&o.owner_id)
                    .map(String::as_str)
                    .unwrap_or(UNKNOWN_OWNER);
                OccurrenceView::from_occurrence(o, name)
            })
            .collect())
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        return Err(AppError::Validation(
            "Window end must not precede window start".to_string(),
        ));
    }
    Ok(())
}

/// Group ascending views by owner, ordering owners by display name then ID.
fn group_by_owner(views: impl IntoIterator<Item = OccurrenceView>) -> Vec<OwnerSchedule> {
    let mut groups: BTreeMap<(String, String), Vec<OccurrenceView>> = BTreeMap::new();
    for view in views {
        groups
            .entry((view.owner_name.clone(), view.owner_id.clone()))
            .or_default()
            .push(view);
    }

    groups
        .into_iter()
        .map(|((owner_name, owner_id), occurrences)| OwnerSchedule {
            owner_id,
            owner_name,
            occurrences,
        })
        .collect()
}
