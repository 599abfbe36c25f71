//! Skill configuration rows and their delivery lifecycle.
//!
//! One row per (subject, skill_slug). The dashboard writes rows, the remote
//! agent pulls them and reports back what it managed to apply. `sync_state`
//! tracks that delivery: pending → syncing → applied | failed, with any later
//! dashboard write resetting the row to pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Delivery stage of one config row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
    /// Written by the dashboard, not yet seen by the agent.
    Pending,
    /// Delivered in a pull, awaiting the agent's acknowledgement.
    Syncing,
    /// Agent reported it applied the config.
    Applied,
    /// Agent reported it could not apply the config (see `sync_error`).
    Failed,
}

impl SyncState {
    /// Parse from a stored string, treating unknown values as pending so the
    /// row gets re-delivered rather than dropped.
    pub fn from_str_or_pending(s: &str) -> Self {
        s.parse().unwrap_or(SyncState::Pending)
    }

    /// The two outcomes an agent is allowed to report.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Applied | SyncState::Failed)
    }
}

/// Where a config value originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfigSource {
    /// Authored through the dashboard UI.
    #[default]
    Dashboard,
    /// Hand-edited by the owner (e.g. raw JSON editor).
    Manual,
    /// Installed from a preset bundle.
    Preset,
    /// Seeded by the server as a skill default.
    Default,
}

/// One skill configuration row as stored and served.
#[derive(Debug, Clone, Serialize)]
pub struct SkillConfig {
    pub id: i64,
    pub subject: String,
    pub skill_slug: String,
    pub enabled: bool,
    /// Opaque key/value map the agent interprets; the server never looks inside.
    pub payload: serde_json::Value,
    pub source: ConfigSource,
    pub schema_version: i32,
    pub sync_state: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a (possibly batched) sync acknowledgement from the agent.
///
/// `sync_status` stays a plain string here so one malformed entry cannot fail
/// deserialization of a whole batch; it is validated per entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResultEntry {
    #[serde(default)]
    pub skill_slug: String,
    #[serde(default)]
    pub sync_status: String,
    #[serde(default)]
    pub sync_error: Option<String>,
}
