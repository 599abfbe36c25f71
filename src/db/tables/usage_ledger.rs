//! Usage ledger database operations
//!
//! Entries are append-only: there is no update or delete path, corrections
//! are new entries.

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::{DailyUsage, UsageLedgerEntry, UsageOperation, UsageSummary};

impl Database {
    /// Append one immutable entry and return it.
    pub fn record_usage(
        &self,
        subject: &str,
        operation: UsageOperation,
        cost: f64,
        related_skill: Option<&str>,
        metadata: &serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> SqliteResult<UsageLedgerEntry> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO usage_ledger (subject, operation, cost, related_skill, metadata, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                subject,
                operation.as_ref(),
                cost,
                related_skill,
                metadata.to_string(),
                occurred_at.to_rfc3339()
            ],
        )?;

        let id = conn.last_insert_rowid();

        Ok(UsageLedgerEntry {
            id,
            subject: subject.to_string(),
            operation,
            cost,
            related_skill: related_skill.map(|s| s.to_string()),
            metadata: metadata.clone(),
            occurred_at,
        })
    }

    /// Total cost and entry count over `[start, end]`. The end bound is
    /// inclusive so a charge stamped at the query instant is counted.
    pub fn summarize_usage(
        &self,
        subject: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SqliteResult<UsageSummary> {
        let conn = self.conn();

        conn.query_row(
            "SELECT COALESCE(SUM(cost), 0), COUNT(*) FROM usage_ledger
             WHERE subject = ?1 AND occurred_at >= ?2 AND occurred_at <= ?3",
            rusqlite::params![subject, start.to_rfc3339(), end.to_rfc3339()],
            |row| {
                Ok(UsageSummary {
                    total_cost: row.get(0)?,
                    operation_count: row.get(1)?,
                })
            },
        )
    }

    /// Per-day totals since `start`, oldest day first. Days are the UTC date
    /// prefix of the stored timestamp.
    pub fn usage_by_day(
        &self,
        subject: &str,
        start: DateTime<Utc>,
    ) -> SqliteResult<Vec<DailyUsage>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT substr(occurred_at, 1, 10) AS day, COALESCE(SUM(cost), 0), COUNT(*)
             FROM usage_ledger
             WHERE subject = ?1 AND occurred_at >= ?2
             GROUP BY day ORDER BY day",
        )?;

        let days = stmt
            .query_map(rusqlite::params![subject, start.to_rfc3339()], |row| {
                Ok(DailyUsage {
                    day: row.get(0)?,
                    total_cost: row.get(1)?,
                    operation_count: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(days)
    }
}
