//! Last-known liveness of the remote agent, one row per subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

/// Liveness reported by the agent on each heartbeat.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStatus {
    /// Running and ready for work.
    Online,
    /// Actively processing a task.
    Thinking,
    /// Running but intentionally quiescent.
    Idle,
    /// Shut down (or never seen).
    #[default]
    Offline,
}

impl AgentStatus {
    /// Statuses that open (or keep open) a billing session.
    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Online | AgentStatus::Thinking)
    }
}

/// Last-write-wins status row maintained by the heartbeat meter.
///
/// `session_start` is set only on a transition into an active status from
/// offline/unset and survives subsequent heartbeats until the agent reports
/// offline, at which point both session fields are cleared.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusRecord {
    pub subject: String,
    pub status: AgentStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub session_id: Option<Uuid>,
    pub session_start: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_snake_case() {
        assert_eq!("online".parse::<AgentStatus>().unwrap(), AgentStatus::Online);
        assert_eq!("thinking".parse::<AgentStatus>().unwrap(), AgentStatus::Thinking);
        assert_eq!("idle".parse::<AgentStatus>().unwrap(), AgentStatus::Idle);
        assert_eq!("offline".parse::<AgentStatus>().unwrap(), AgentStatus::Offline);
        assert!("restarting".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_active_statuses() {
        assert!(AgentStatus::Online.is_active());
        assert!(AgentStatus::Thinking.is_active());
        assert!(!AgentStatus::Idle.is_active());
        assert!(!AgentStatus::Offline.is_active());
    }
}
