// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Recurrence rules (owner-authored schedules)
//! - Session occurrences (materialized, individually stateful sessions)
//! - Coaches and class templates (read-only lookups)

use super::{collections, matches_query, OccurrenceQuery, RuleFilter, ScheduleStore};
use crate::error::AppError;
use crate::models::{
    ClassTemplate, CoachProfile, OccurrenceStatus, RecurrenceRule, SessionOccurrence,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::{HashMap, HashSet};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Directory Seeding ───────────────────────────────────────

    /// Write a coach profile. Production data is owned by the coach service;
    /// this exists for emulator fixtures.
    pub async fn upsert_coach(&self, coach: &CoachProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COACHES)
            .document_id(&coach.id)
            .object(coach)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write a class template (emulator fixtures).
    pub async fn upsert_class_template(&self, template: &ClassTemplate) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CLASS_TEMPLATES)
            .document_id(&template.id)
            .object(template)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ──────────────────────────────────────────

    /// Helper to batch write documents using transactions.
    async fn batch_upsert_occurrences(
        &self,
        occurrences: &[&SessionOccurrence],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in occurrences.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for occurrence in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::SESSION_OCCURRENCES)
                    .document_id(&occurrence.id)
                    .object(*occurrence)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add occurrence {} to transaction: {}",
                            occurrence.id, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit occurrence batch: {}", e))
            })?;
        }

        Ok(())
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for FirestoreDb {
    // ─── Rule Operations ─────────────────────────────────────────

    async fn get_rule(&self, rule_id: &str) -> Result<Option<RecurrenceRule>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RECURRENCE_RULES)
            .obj()
            .one(rule_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_rule(&self, rule: &RecurrenceRule) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RECURRENCE_RULES)
            .document_id(&rule.id)
            .object(rule)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<bool, AppError> {
        if self.get_rule(rule_id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RECURRENCE_RULES)
            .document_id(rule_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<RecurrenceRule>, AppError> {
        let owner_id = filter.owner_id.clone();
        let public_only = !filter.include_private;

        let mut rules: Vec<RecurrenceRule> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RECURRENCE_RULES)
            .filter(move |q| {
                q.for_all([
                    owner_id
                        .as_ref()
                        .and_then(|owner| q.field("owner_id").eq(owner.clone())),
                    public_only.then(|| q.field("is_private").eq(false)).flatten(),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rules.sort_by(|a, b| a.anchor.cmp(&b.anchor).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    // ─── Occurrence Operations ───────────────────────────────────

    /// Existing IDs are looked up per rule first so re-materialization never
    /// resets the status of a row that was already cancelled or completed.
    async fn insert_occurrences(
        &self,
        occurrences: &[SessionOccurrence],
    ) -> Result<usize, AppError> {
        let rule_ids: HashSet<&str> = occurrences
            .iter()
            .filter_map(|o| o.rule_id.as_deref())
            .collect();

        let mut existing: HashSet<String> = HashSet::new();
        for rule_id in rule_ids {
            existing.extend(
                self.list_rule_occurrences(rule_id)
                    .await?
                    .into_iter()
                    .map(|o| o.id),
            );
        }

        let fresh: Vec<&SessionOccurrence> = occurrences
            .iter()
            .filter(|o| !existing.contains(&o.id))
            .collect();

        self.batch_upsert_occurrences(&fresh).await?;

        tracing::debug!(
            requested = occurrences.len(),
            inserted = fresh.len(),
            "Inserted occurrences"
        );

        Ok(fresh.len())
    }

    async fn get_occurrence(&self, id: &str) -> Result<Option<SessionOccurrence>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSION_OCCURRENCES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Compare-and-set inside a Firestore transaction.
    ///
    /// The read is made through the transaction so a concurrent writer to the
    /// same document makes the commit fail instead of being overwritten.
    async fn transition_occurrence(
        &self,
        id: &str,
        target: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<OccurrenceStatus>, AppError> {
        if !target.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "cannot move occurrence {id} to {}",
                target.as_str()
            )));
        }

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let transactional = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<SessionOccurrence> = transactional
            .fluent()
            .select()
            .by_id_in(collections::SESSION_OCCURRENCES)
            .obj()
            .one(id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read occurrence in transaction: {}", e))
            })?;

        let Some(mut occurrence) = current else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        let previous = occurrence.status;
        if !previous.can_transition_to(target) {
            let _ = transaction.rollback().await;
            return Ok(Some(previous));
        }

        occurrence.status = target;
        occurrence.updated_at = at;

        client
            .fluent()
            .update()
            .in_col(collections::SESSION_OCCURRENCES)
            .document_id(id)
            .object(&occurrence)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add status to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(Some(previous))
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let now_str = format_utc_rfc3339(now);

        let expired: Vec<SessionOccurrence> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SESSION_OCCURRENCES)
            .filter(move |q| {
                q.for_all([
                    q.field("status").eq(OccurrenceStatus::Pending.as_str()),
                    q.field("end").less_than(now_str.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let candidates = expired.len();

        let results = stream::iter(expired)
            .map(|row| async move {
                let outcome = self
                    .transition_occurrence(&row.id, OccurrenceStatus::Completed, now)
                    .await;
                (row.id, outcome)
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<_>>()
            .await;

        let mut modified = 0u64;
        for (id, outcome) in results {
            match outcome {
                Ok(Some(OccurrenceStatus::Pending)) => modified += 1,
                Ok(_) => {}
                Err(e) => {
                    // Left pending; the next sweep picks it up again.
                    tracing::warn!(occurrence_id = %id, error = %e, "Failed to complete occurrence");
                }
            }
        }

        tracing::debug!(candidates, modified, "Completed expired occurrences");
        Ok(modified)
    }

    async fn list_rule_occurrences(
        &self,
        rule_id: &str,
    ) -> Result<Vec<SessionOccurrence>, AppError> {
        let rule_id = rule_id.to_string();

        let mut rows: Vec<SessionOccurrence> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SESSION_OCCURRENCES)
            .filter(move |q| q.for_all([q.field("rule_id").eq(rule_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.sort_by_key(|o| o.start);
        Ok(rows)
    }

    async fn delete_rule_occurrences(
        &self,
        rule_id: &str,
        from: DateTime<Utc>,
        pending_only: bool,
    ) -> Result<usize, AppError> {
        let doomed: Vec<SessionOccurrence> = self
            .list_rule_occurrences(rule_id)
            .await?
            .into_iter()
            .filter(|o| o.start >= from)
            .filter(|o| !pending_only || o.status == OccurrenceStatus::Pending)
            .collect();

        let count = doomed.len();
        self.batch_delete(
            &doomed,
            collections::SESSION_OCCURRENCES,
            |o: &SessionOccurrence| o.id.clone(),
        )
        .await?;

        tracing::debug!(rule_id, count, "Deleted rule occurrences");
        Ok(count)
    }

    /// Range and equality filters run in Firestore; the cancelled-status
    /// exclusion runs in memory since Firestore rejects `!=` alongside a
    /// range filter on another field.
    async fn query_occurrences(
        &self,
        query: &OccurrenceQuery,
    ) -> Result<Vec<SessionOccurrence>, AppError> {
        let start = format_utc_rfc3339(query.start);
        let end = format_utc_rfc3339(query.end);
        let owner_id = query.owner_id.clone();
        let public_only = !query.include_private;

        let rows: Vec<SessionOccurrence> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SESSION_OCCURRENCES)
            .filter(move |q| {
                q.for_all([
                    q.field("start").greater_than_or_equal(start.clone()),
                    q.field("start").less_than_or_equal(end.clone()),
                    owner_id
                        .as_ref()
                        .and_then(|owner| q.field("owner_id").eq(owner.clone())),
                    public_only.then(|| q.field("is_private").eq(false)).flatten(),
                ])
            })
            .order_by([("start", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter(|o| matches_query(o, query))
            .collect())
    }

    // ─── Directory Lookups ───────────────────────────────────────

    async fn coach_names(
        &self,
        owner_ids: &[String],
    ) -> Result<HashMap<String, String>, AppError> {
        let client = self.get_client()?;

        let profiles = stream::iter(owner_ids.to_vec())
            .map(|id| async move {
                client
                    .fluent()
                    .select()
                    .by_id_in(collections::COACHES)
                    .obj::<CoachProfile>()
                    .one(&id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<CoachProfile>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<CoachProfile>>, AppError>>()?;

        Ok(profiles
            .into_iter()
            .flatten()
            .map(|coach| (coach.id, coach.display_name))
            .collect())
    }

    async fn get_class_template(
        &self,
        template_id: &str,
    ) -> Result<Option<ClassTemplate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CLASS_TEMPLATES)
            .obj()
            .one(template_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
