//! Skill configuration database operations

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::{ConfigSource, SkillConfig, SyncState};

/// Result of a dashboard write: either the committed row, or the
/// authoritative timestamp that invalidated the caller's expectation.
pub enum ConfigUpsertOutcome {
    Written(SkillConfig),
    Conflict { current_updated_at: DateTime<Utc> },
}

impl Database {
    pub(crate) fn map_skill_config_row(row: &rusqlite::Row) -> rusqlite::Result<SkillConfig> {
        let payload_str: String = row.get(4)?;
        let source_str: String = row.get(5)?;
        let sync_state_str: String = row.get(7)?;
        let updated_at_str: String = row.get(9)?;

        Ok(SkillConfig {
            id: row.get(0)?,
            subject: row.get(1)?,
            skill_slug: row.get(2)?,
            enabled: row.get::<_, i32>(3)? != 0,
            payload: serde_json::from_str(&payload_str).unwrap_or_else(|_| serde_json::json!({})),
            source: source_str.parse().unwrap_or_default(),
            schema_version: row.get(6)?,
            sync_state: SyncState::from_str_or_pending(&sync_state_str),
            sync_error: row.get(8)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }

    fn fetch_skill_config(
        conn: &Connection,
        subject: &str,
        skill_slug: &str,
    ) -> SqliteResult<Option<SkillConfig>> {
        let mut stmt = conn.prepare(
            "SELECT id, subject, skill_slug, enabled, payload, source, schema_version, sync_state, sync_error, updated_at
             FROM skill_configs WHERE subject = ?1 AND skill_slug = ?2",
        )?;

        stmt.query_row([subject, skill_slug], |row| Self::map_skill_config_row(row))
            .optional()
    }

    #[allow(dead_code)]
    pub fn get_skill_config(
        &self,
        subject: &str,
        skill_slug: &str,
    ) -> SqliteResult<Option<SkillConfig>> {
        let conn = self.conn();
        Self::fetch_skill_config(&conn, subject, skill_slug)
    }

    pub fn list_skill_configs(&self, subject: &str) -> SqliteResult<Vec<SkillConfig>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT id, subject, skill_slug, enabled, payload, source, schema_version, sync_state, sync_error, updated_at
             FROM skill_configs WHERE subject = ?1 ORDER BY skill_slug",
        )?;

        let configs = stmt
            .query_map([subject], |row| Self::map_skill_config_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(configs)
    }

    /// Create or update one config row. Absent fields keep their stored
    /// values (new rows get defaults). Any write re-queues the row as
    /// pending with `sync_error` cleared.
    ///
    /// When `expected_updated_at` is given and an existing row carries a
    /// different timestamp, nothing is written and the conflict is reported.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_skill_config(
        &self,
        subject: &str,
        skill_slug: &str,
        enabled: Option<bool>,
        payload: Option<&serde_json::Value>,
        source: Option<ConfigSource>,
        expected_updated_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SqliteResult<ConfigUpsertOutcome> {
        let conn = self.conn();

        let existing = Self::fetch_skill_config(&conn, subject, skill_slug)?;

        if let (Some(expected), Some(current)) = (expected_updated_at, existing.as_ref()) {
            if current.updated_at != expected {
                return Ok(ConfigUpsertOutcome::Conflict {
                    current_updated_at: current.updated_at,
                });
            }
        }

        let now_str = now.to_rfc3339();

        match existing {
            Some(current) => {
                let enabled = enabled.unwrap_or(current.enabled);
                let payload = payload.cloned().unwrap_or(current.payload);
                let source = source.unwrap_or(current.source);

                conn.execute(
                    "UPDATE skill_configs
                     SET enabled = ?1, payload = ?2, source = ?3,
                         sync_state = 'pending', sync_error = NULL, updated_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![
                        if enabled { 1 } else { 0 },
                        payload.to_string(),
                        source.as_ref(),
                        &now_str,
                        current.id
                    ],
                )?;
            }
            None => {
                let enabled = enabled.unwrap_or(true);
                let payload = payload
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                let source = source.unwrap_or_default();

                conn.execute(
                    "INSERT INTO skill_configs (subject, skill_slug, enabled, payload, source, sync_state, sync_error, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'pending', NULL, ?6)",
                    rusqlite::params![
                        subject,
                        skill_slug,
                        if enabled { 1 } else { 0 },
                        payload.to_string(),
                        source.as_ref(),
                        &now_str
                    ],
                )?;
            }
        }

        let written = Self::fetch_skill_config(&conn, subject, skill_slug)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;

        Ok(ConfigUpsertOutcome::Written(written))
    }

    /// Deliver configs for an agent pull and mark the delivered pending rows
    /// as syncing, in one transaction. Already-syncing rows are resent
    /// unchanged, so a pull lost in transit is safe to retry. `updated_at`
    /// is left untouched so the agent's `since` cursor stays valid.
    pub fn pull_skill_configs(
        &self,
        subject: &str,
        since: Option<DateTime<Utc>>,
        include_all: bool,
    ) -> SqliteResult<Vec<SkillConfig>> {
        let mut guard = self.conn();
        let tx = guard.transaction()?;

        let mut sql = String::from(
            "SELECT id, subject, skill_slug, enabled, payload, source, schema_version, sync_state, sync_error, updated_at
             FROM skill_configs WHERE subject = ?1",
        );
        if !include_all {
            sql.push_str(" AND sync_state IN ('pending', 'syncing')");
        }
        let since_str = since.map(|s| s.to_rfc3339());
        if since_str.is_some() {
            sql.push_str(" AND updated_at > ?2");
        }
        sql.push_str(" ORDER BY updated_at, id");

        let mut configs: Vec<SkillConfig> = {
            let mut stmt = tx.prepare(&sql)?;
            match &since_str {
                Some(s) => stmt
                    .query_map(rusqlite::params![subject, s], |row| {
                        Self::map_skill_config_row(row)
                    })?
                    .filter_map(|r| r.ok())
                    .collect(),
                None => stmt
                    .query_map([subject], |row| Self::map_skill_config_row(row))?
                    .filter_map(|r| r.ok())
                    .collect(),
            }
        };

        for config in configs.iter_mut() {
            if config.sync_state == SyncState::Pending {
                tx.execute(
                    "UPDATE skill_configs SET sync_state = 'syncing' WHERE id = ?1",
                    [config.id],
                )?;
                config.sync_state = SyncState::Syncing;
            }
        }

        tx.commit()?;
        Ok(configs)
    }

    pub fn count_pending_skill_configs(&self, subject: &str) -> SqliteResult<i64> {
        let conn = self.conn();

        conn.query_row(
            "SELECT COUNT(*) FROM skill_configs WHERE subject = ?1 AND sync_state = 'pending'",
            [subject],
            |row| row.get(0),
        )
    }

    /// Record the agent's applied/failed verdict for one row. The error
    /// message is only kept for failures. Returns false when the
    /// (subject, slug) pair does not exist.
    pub fn apply_sync_result(
        &self,
        subject: &str,
        skill_slug: &str,
        state: SyncState,
        sync_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> SqliteResult<bool> {
        let conn = self.conn();
        let error = if state == SyncState::Failed {
            sync_error
        } else {
            None
        };

        let rows_affected = conn.execute(
            "UPDATE skill_configs SET sync_state = ?1, sync_error = ?2, updated_at = ?3
             WHERE subject = ?4 AND skill_slug = ?5",
            rusqlite::params![state.as_ref(), error, now.to_rfc3339(), subject, skill_slug],
        )?;

        Ok(rows_affected > 0)
    }
}
