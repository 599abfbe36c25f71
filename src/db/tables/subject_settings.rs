//! Subject settings database operations

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::models::SubjectSettings;

impl Database {
    fn map_subject_settings_row(row: &rusqlite::Row) -> rusqlite::Result<SubjectSettings> {
        let updated_at_str: String = row.get(4)?;

        Ok(SubjectSettings {
            subject: row.get(0)?,
            daily_cap: row.get(1)?,
            monthly_cap: row.get(2)?,
            sync_enabled: row.get::<_, i32>(3)? != 0,
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .unwrap()
                .with_timezone(&Utc),
        })
    }

    /// Read through the settings cache; "no row" is cached as well.
    pub fn get_subject_settings(&self, subject: &str) -> SqliteResult<Option<SubjectSettings>> {
        if let Some(cached) = self.cache.get_subject_settings(subject) {
            return Ok(cached);
        }

        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT subject, daily_cap, monthly_cap, sync_enabled, updated_at
             FROM subject_settings WHERE subject = ?1",
        )?;

        let settings = stmt
            .query_row([subject], |row| Self::map_subject_settings_row(row))
            .optional()?;

        self.cache.set_subject_settings(subject, settings.clone());
        Ok(settings)
    }

    /// Partial upsert. The outer `Option` means "field present in the
    /// request", the inner one carries an explicit null that clears a cap
    /// back to the server default.
    pub fn upsert_subject_settings(
        &self,
        subject: &str,
        daily_cap: Option<Option<f64>>,
        monthly_cap: Option<Option<f64>>,
        sync_enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> SqliteResult<SubjectSettings> {
        let conn = self.conn();
        let now_str = now.to_rfc3339();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM subject_settings WHERE subject = ?1",
                [subject],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_some() {
            // Build dynamic update query
            let mut updates = vec!["updated_at = ?1".to_string()];
            let mut param_idx = 2;

            if daily_cap.is_some() {
                updates.push(format!("daily_cap = ?{}", param_idx));
                param_idx += 1;
            }
            if monthly_cap.is_some() {
                updates.push(format!("monthly_cap = ?{}", param_idx));
                param_idx += 1;
            }
            if sync_enabled.is_some() {
                updates.push(format!("sync_enabled = ?{}", param_idx));
                param_idx += 1;
            }

            let sql = format!(
                "UPDATE subject_settings SET {} WHERE subject = ?{}",
                updates.join(", "),
                param_idx
            );

            let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now_str)];
            if let Some(v) = daily_cap {
                params.push(Box::new(v));
            }
            if let Some(v) = monthly_cap {
                params.push(Box::new(v));
            }
            if let Some(v) = sync_enabled {
                params.push(Box::new(if v { 1 } else { 0 }));
            }
            params.push(Box::new(subject.to_string()));

            let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
            conn.execute(&sql, params_ref.as_slice())?;
        } else {
            conn.execute(
                "INSERT INTO subject_settings (subject, daily_cap, monthly_cap, sync_enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    subject,
                    daily_cap.flatten(),
                    monthly_cap.flatten(),
                    if sync_enabled.unwrap_or(true) { 1 } else { 0 },
                    now_str
                ],
            )?;
        }

        drop(conn);
        self.cache.invalidate_subject_settings(subject);

        // Return the committed row (repopulates the cache)
        self.get_subject_settings(subject).map(|opt| opt.unwrap())
    }

    /// Whether config pulls are allowed for this subject. Defaults to true
    /// when no settings row exists.
    pub fn is_sync_enabled(&self, subject: &str) -> SqliteResult<bool> {
        Ok(self
            .get_subject_settings(subject)?
            .map(|s| s.sync_enabled)
            .unwrap_or(true))
    }
}
