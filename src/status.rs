//! Read-side view of agent liveness.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ApiError;
use crate::models::AgentStatus;

pub struct AgentStatusTracker {
    db: Arc<Database>,
}

/// Status row plus the derived session duration. Subjects that never
/// heartbeated read as offline rather than missing.
#[derive(Debug, Serialize)]
pub struct AgentStatusView {
    pub subject: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration_secs: Option<i64>,
}

impl AgentStatusTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn current(&self, subject: &str, now: DateTime<Utc>) -> Result<AgentStatusView, ApiError> {
        let record = self.db.get_agent_status(subject)?;

        Ok(match record {
            Some(r) => {
                // Duration only while the agent is actively working a session
                let session_duration_secs = match (r.status.is_active(), r.session_start) {
                    (true, Some(start)) => Some((now - start).num_seconds().max(0)),
                    _ => None,
                };

                AgentStatusView {
                    subject: r.subject,
                    status: r.status,
                    last_heartbeat: r.last_heartbeat,
                    session_id: r.session_id,
                    session_start: r.session_start,
                    session_duration_secs,
                }
            }
            None => AgentStatusView {
                subject: subject.to_string(),
                status: AgentStatus::Offline,
                last_heartbeat: None,
                session_id: None,
                session_start: None,
                session_duration_secs: None,
            },
        })
    }
}
