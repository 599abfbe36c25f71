//! Agent status database operations

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};
use uuid::Uuid;

use super::super::Database;
use crate::models::AgentStatusRecord;

impl Database {
    fn map_agent_status_row(row: &rusqlite::Row) -> rusqlite::Result<AgentStatusRecord> {
        let status_str: String = row.get(1)?;
        let last_heartbeat_str: Option<String> = row.get(2)?;
        let session_id_str: Option<String> = row.get(3)?;
        let session_start_str: Option<String> = row.get(4)?;

        Ok(AgentStatusRecord {
            subject: row.get(0)?,
            status: status_str.parse().unwrap_or_default(),
            last_heartbeat: last_heartbeat_str.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
            session_id: session_id_str.and_then(|s| Uuid::parse_str(&s).ok()),
            session_start: session_start_str.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
        })
    }

    pub fn get_agent_status(&self, subject: &str) -> SqliteResult<Option<AgentStatusRecord>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT subject, status, last_heartbeat, session_id, session_start
             FROM agent_status WHERE subject = ?1",
        )?;

        stmt.query_row([subject], |row| Self::map_agent_status_row(row))
            .optional()
    }

    /// Last-write-wins replace of the subject's status row.
    pub fn upsert_agent_status(&self, record: &AgentStatusRecord) -> SqliteResult<()> {
        let conn = self.conn();

        let rows_affected = conn.execute(
            "UPDATE agent_status SET status = ?1, last_heartbeat = ?2, session_id = ?3, session_start = ?4
             WHERE subject = ?5",
            rusqlite::params![
                record.status.as_ref(),
                record.last_heartbeat.map(|t| t.to_rfc3339()),
                record.session_id.map(|u| u.to_string()),
                record.session_start.map(|t| t.to_rfc3339()),
                record.subject
            ],
        )?;

        if rows_affected == 0 {
            conn.execute(
                "INSERT INTO agent_status (subject, status, last_heartbeat, session_id, session_start)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.subject,
                    record.status.as_ref(),
                    record.last_heartbeat.map(|t| t.to_rfc3339()),
                    record.session_id.map(|u| u.to_string()),
                    record.session_start.map(|t| t.to_rfc3339()),
                ],
            )?;
        }

        Ok(())
    }
}
