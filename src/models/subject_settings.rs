//! Per-subject configuration: spend caps and the sync kill-switch.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stored per-subject settings row. Cap fields are `None` until the owner
/// sets them, in which case the configured server defaults apply.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectSettings {
    pub subject: String,
    pub daily_cap: Option<f64>,
    pub monthly_cap: Option<f64>,
    /// When false, config pulls return nothing (and say so) without mutating
    /// any row state.
    pub sync_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl SubjectSettings {
    /// Effective caps after applying server defaults for unset fields.
    pub fn effective_caps(&self, default_daily: f64, default_monthly: f64) -> (f64, f64) {
        (
            self.daily_cap.unwrap_or(default_daily),
            self.monthly_cap.unwrap_or(default_monthly),
        )
    }
}
