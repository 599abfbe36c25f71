//! State machine governing config delivery: dashboard writes rows as
//! `pending`, agent pulls move them to `syncing`, agent acknowledgements
//! settle them as `applied` or `failed`. Any later dashboard write re-queues
//! the row. All validation of caller-supplied strings happens here, before
//! any state is touched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::tables::skill_configs::ConfigUpsertOutcome;
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{ConfigSource, SkillConfig, SyncResultEntry, SyncState, UsageOperation};

pub struct ConfigSyncEngine {
    db: Arc<Database>,
}

/// Body of a pull response. `sync_enabled: false` tells the agent the empty
/// set means "turned off", not "caught up"; `pending_count` counts rows that
/// remain undelivered (e.g. filtered out by the `since` cursor).
#[derive(Debug, Serialize)]
pub struct PulledConfigs {
    pub configs: Vec<SkillConfig>,
    pub pending_count: i64,
    pub sync_enabled: bool,
    pub server_time: DateTime<Utc>,
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::validation(field, "must be an RFC 3339 timestamp"))
}

/// Acks may only report the two terminal outcomes.
fn parse_terminal_state(value: &str) -> Option<SyncState> {
    value
        .parse::<SyncState>()
        .ok()
        .filter(|state| state.is_terminal())
}

impl ConfigSyncEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Dashboard write. Missing fields keep stored values (defaults on
    /// create); the committed row is re-queued as pending. After the commit
    /// a zero-cost audit entry lands in the ledger.
    pub fn write(
        &self,
        subject: &str,
        skill_slug: &str,
        enabled: Option<bool>,
        payload: Option<&serde_json::Value>,
        source: Option<&str>,
        expected_updated_at: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SkillConfig, ApiError> {
        let skill_slug = skill_slug.trim();
        if skill_slug.is_empty() {
            return Err(ApiError::validation("skill_slug", "must not be empty"));
        }

        if let Some(value) = payload {
            if !value.is_object() {
                return Err(ApiError::validation("config", "must be a JSON object"));
            }
        }

        let source = match source {
            Some(s) => Some(s.parse::<ConfigSource>().map_err(|_| {
                ApiError::validation(
                    "config_source",
                    "must be one of dashboard, manual, preset, default",
                )
            })?),
            None => None,
        };

        let expected = match expected_updated_at {
            Some(raw) => Some(parse_timestamp("expected_updated_at", raw)?),
            None => None,
        };

        let outcome = self.db.upsert_skill_config(
            subject, skill_slug, enabled, payload, source, expected, now,
        )?;

        let written = match outcome {
            ConfigUpsertOutcome::Written(config) => config,
            ConfigUpsertOutcome::Conflict { current_updated_at } => {
                return Err(ApiError::Conflict { current_updated_at });
            }
        };

        // Audit trail; never blocks the write that already committed
        let metadata = serde_json::json!({
            "source": written.source.as_ref(),
            "enabled": written.enabled,
        });
        if let Err(e) = self.db.record_usage(
            subject,
            UsageOperation::ConfigWrite,
            0.0,
            Some(skill_slug),
            &metadata,
            now,
        ) {
            log::error!("[SYNC] failed to record config write for {}: {}", subject, e);
        }

        Ok(written)
    }

    pub fn list(&self, subject: &str) -> Result<Vec<SkillConfig>, ApiError> {
        Ok(self.db.list_skill_configs(subject)?)
    }

    /// Agent pull. Returns undelivered rows (all rows with `include_all`)
    /// newer than the optional `since` cursor and marks delivered pending
    /// rows as syncing. When the subject has sync disabled nothing is read
    /// or mutated.
    pub fn pull(
        &self,
        subject: &str,
        since: Option<&str>,
        include_all: bool,
        now: DateTime<Utc>,
    ) -> Result<PulledConfigs, ApiError> {
        let since = match since {
            Some(raw) => Some(parse_timestamp("since", raw)?),
            None => None,
        };

        if !self.db.is_sync_enabled(subject)? {
            return Ok(PulledConfigs {
                configs: Vec::new(),
                pending_count: self.db.count_pending_skill_configs(subject)?,
                sync_enabled: false,
                server_time: now,
            });
        }

        let configs = self.db.pull_skill_configs(subject, since, include_all)?;
        let pending_count = self.db.count_pending_skill_configs(subject)?;

        if !configs.is_empty() {
            log::info!(
                "[SYNC] delivered {} config(s) to {} ({} still pending)",
                configs.len(),
                subject,
                pending_count
            );
        }

        Ok(PulledConfigs {
            configs,
            pending_count,
            sync_enabled: true,
            server_time: now,
        })
    }

    /// Single acknowledgement. The agent is the sole authority on the
    /// outcome, so the write is unconditional once validated.
    pub fn acknowledge(
        &self,
        subject: &str,
        skill_slug: &str,
        sync_status: &str,
        sync_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let skill_slug = skill_slug.trim();
        if skill_slug.is_empty() {
            return Err(ApiError::validation("skill_slug", "must not be empty"));
        }

        let state = parse_terminal_state(sync_status)
            .ok_or_else(|| ApiError::validation("sync_status", "must be applied or failed"))?;

        if !self
            .db
            .apply_sync_result(subject, skill_slug, state, sync_error, now)?
        {
            return Err(ApiError::NotFound {
                entity: "skill config",
            });
        }

        Ok(())
    }

    /// Batched acknowledgements. Malformed or unknown entries are skipped
    /// with a warning and excluded from the returned count; only a store
    /// failure aborts the batch.
    pub fn acknowledge_batch(
        &self,
        subject: &str,
        results: &[SyncResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, ApiError> {
        let mut updated = 0;

        for entry in results {
            let skill_slug = entry.skill_slug.trim();
            if skill_slug.is_empty() {
                log::warn!("[SYNC] skipping ack with empty skill_slug for {}", subject);
                continue;
            }

            let Some(state) = parse_terminal_state(&entry.sync_status) else {
                log::warn!(
                    "[SYNC] skipping ack for {} with invalid sync_status '{}'",
                    skill_slug,
                    entry.sync_status
                );
                continue;
            };

            if self.db.apply_sync_result(
                subject,
                skill_slug,
                state,
                entry.sync_error.as_deref(),
                now,
            )? {
                updated += 1;
            } else {
                log::warn!("[SYNC] skipping ack for unknown skill '{}'", skill_slug);
            }
        }

        Ok(updated)
    }
}
