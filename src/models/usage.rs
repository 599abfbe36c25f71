//! Append-only usage ledger types.
//!
//! Every billable or free operation leaves an immutable entry; summaries over
//! time windows drive the spend-cap check and the dashboard history chart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// What a ledger entry records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageOperation {
    /// Billable compute time derived from heartbeat gaps.
    Compute,
    /// Zero-cost liveness tick, kept for observability.
    #[default]
    Heartbeat,
    /// Zero-cost audit entry written after a dashboard config write commits.
    ConfigWrite,
}

/// Immutable record of one operation. Never mutated or deleted.
#[derive(Debug, Clone, Serialize)]
pub struct UsageLedgerEntry {
    pub id: i64,
    pub subject: String,
    pub operation: UsageOperation,
    /// Currency-of-record units; zero for free operations.
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_skill: Option<String>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate over a closed time window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total_cost: f64,
    pub operation_count: i64,
}

/// One calendar day (UTC) of usage for history queries.
#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    /// `YYYY-MM-DD`.
    pub day: String,
    pub total_cost: f64,
    pub operation_count: i64,
}
