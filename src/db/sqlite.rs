use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::cache::DbCache;
use crate::models::AuthSession;

pub struct Database {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) cache: DbCache,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(database_url)?;
        let db = Self {
            conn: Mutex::new(conn),
            cache: DbCache::new(),
        };
        db.init()?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn();

        // Bearer sessions, bound to the authenticated subject
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT UNIQUE NOT NULL,
                subject TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
            [],
        )?;

        // Skill configuration rows, one per (subject, skill)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS skill_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                skill_slug TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                payload TEXT NOT NULL DEFAULT '{}',
                source TEXT NOT NULL DEFAULT 'dashboard',
                schema_version INTEGER NOT NULL DEFAULT 1,
                sync_state TEXT NOT NULL DEFAULT 'pending',
                sync_error TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE(subject, skill_slug)
            )",
            [],
        )?;

        // Append-only usage ledger
        conn.execute(
            "CREATE TABLE IF NOT EXISTS usage_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                operation TEXT NOT NULL,
                cost REAL NOT NULL DEFAULT 0,
                related_skill TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                occurred_at TEXT NOT NULL
            )",
            [],
        )?;

        // Window summaries scan by subject and time
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_usage_ledger_subject_time
             ON usage_ledger (subject, occurred_at)",
            [],
        )?;

        // Last-known agent liveness, one row per subject
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_status (
                subject TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'offline',
                last_heartbeat TEXT,
                session_id TEXT,
                session_start TEXT
            )",
            [],
        )?;

        // Per-subject caps and sync toggle
        conn.execute(
            "CREATE TABLE IF NOT EXISTS subject_settings (
                subject TEXT PRIMARY KEY,
                daily_cap REAL,
                monthly_cap REAL,
                sync_enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    // Session methods
    //
    // Issuance and revocation belong to the auth service that shares this
    // database; the server itself only validates and purges.
    #[allow(dead_code)]
    pub fn create_session(&self, subject: &str) -> SqliteResult<AuthSession> {
        let conn = self.conn();
        let token = Uuid::new_v4().to_string();
        let subject = subject.to_lowercase();
        let created_at = Utc::now();
        let expires_at = created_at + Duration::hours(24);

        conn.execute(
            "INSERT INTO auth_sessions (token, subject, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            [
                &token,
                &subject,
                &created_at.to_rfc3339(),
                &expires_at.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();

        Ok(AuthSession {
            id,
            token,
            subject,
            created_at,
            expires_at,
        })
    }

    pub fn validate_session(&self, token: &str) -> SqliteResult<Option<AuthSession>> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, token, subject, created_at, expires_at FROM auth_sessions WHERE token = ?1 AND expires_at > ?2",
        )?;

        let session = stmt
            .query_row([token, &now], |row| {
                let created_at_str: String = row.get(3)?;
                let expires_at_str: String = row.get(4)?;

                Ok(AuthSession {
                    id: row.get(0)?,
                    token: row.get(1)?,
                    subject: row.get(2)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .unwrap()
                        .with_timezone(&Utc),
                    expires_at: DateTime::parse_from_rfc3339(&expires_at_str)
                        .unwrap()
                        .with_timezone(&Utc),
                })
            })
            .ok();

        Ok(session)
    }

    #[allow(dead_code)]
    pub fn delete_session(&self, token: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let rows_affected = conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
        Ok(rows_affected > 0)
    }

    /// Drop sessions past their expiry. Validation already ignores them;
    /// this keeps the table from growing without bound.
    pub fn purge_expired_sessions(&self) -> SqliteResult<usize> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute("DELETE FROM auth_sessions WHERE expires_at <= ?1", [&now])
    }
}
