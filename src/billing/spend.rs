//! Spend caps over rolling usage windows.
//!
//! The check is advisory at the protocol layer: it is returned to the agent
//! on every heartbeat so it can self-throttle. Enforcement that actually
//! stops work runs outside this service and consults the same oracle.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::Database;
use crate::error::ApiError;

/// Utilisation fraction at which the snapshot starts warning.
const WARNING_THRESHOLD: f64 = 0.8;

/// Server-wide fallback caps for subjects without explicit settings.
#[derive(Debug, Clone, Copy)]
pub struct CapDefaults {
    pub daily: f64,
    pub monthly: f64,
}

/// Outcome of one cap evaluation. `allowed` speaks about the next billable
/// operation; `reason` is set only when denied.
#[derive(Debug, Clone)]
pub struct SpendCheck {
    pub allowed: bool,
    pub daily_spend: f64,
    pub monthly_spend: f64,
    pub daily_cap: f64,
    pub monthly_cap: f64,
    pub reason: Option<String>,
}

/// Wire form of a check, shared by the heartbeat response and the spending
/// endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SpendingSnapshot {
    pub daily_spend: f64,
    pub monthly_spend: f64,
    pub daily_cap: f64,
    pub monthly_cap: f64,
    pub cap_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SpendCheck {
    /// The warning carries the denial reason when capped, otherwise an
    /// approaching-cap notice once either window passes 80% utilisation.
    pub fn into_snapshot(self) -> SpendingSnapshot {
        let warning = if !self.allowed {
            self.reason
        } else if self.daily_spend >= self.daily_cap * WARNING_THRESHOLD {
            Some(format!(
                "Approaching daily spend cap: ${:.2} / ${:.2}",
                self.daily_spend, self.daily_cap
            ))
        } else if self.monthly_spend >= self.monthly_cap * WARNING_THRESHOLD {
            Some(format!(
                "Approaching monthly spend cap: ${:.2} / ${:.2}",
                self.monthly_spend, self.monthly_cap
            ))
        } else {
            None
        };

        SpendingSnapshot {
            daily_spend: self.daily_spend,
            monthly_spend: self.monthly_spend,
            daily_cap: self.daily_cap,
            monthly_cap: self.monthly_cap,
            cap_exceeded: !self.allowed,
            warning,
        }
    }
}

pub struct SpendCapEnforcer {
    db: Arc<Database>,
    defaults: CapDefaults,
}

impl SpendCapEnforcer {
    pub fn new(db: Arc<Database>, defaults: CapDefaults) -> Self {
        Self { db, defaults }
    }

    /// Evaluate the subject's rolling 24h / 30d spend against their caps.
    /// Caps come from subject settings, falling back to the server defaults.
    pub fn check(&self, subject: &str, now: DateTime<Utc>) -> Result<SpendCheck, ApiError> {
        let (daily_cap, monthly_cap) = self
            .db
            .get_subject_settings(subject)?
            .map(|s| s.effective_caps(self.defaults.daily, self.defaults.monthly))
            .unwrap_or((self.defaults.daily, self.defaults.monthly));

        let daily = self
            .db
            .summarize_usage(subject, now - Duration::hours(24), now)?;
        let monthly = self
            .db
            .summarize_usage(subject, now - Duration::days(30), now)?;

        let reason = if daily.total_cost >= daily_cap {
            Some(format!(
                "Daily spend cap reached: ${:.2} / ${:.2}",
                daily.total_cost, daily_cap
            ))
        } else if monthly.total_cost >= monthly_cap {
            Some(format!(
                "Monthly spend cap reached: ${:.2} / ${:.2}",
                monthly.total_cost, monthly_cap
            ))
        } else {
            None
        };

        Ok(SpendCheck {
            allowed: reason.is_none(),
            daily_spend: daily.total_cost,
            monthly_spend: monthly.total_cost,
            daily_cap,
            monthly_cap,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageOperation;

    fn enforcer(db: &Arc<Database>) -> SpendCapEnforcer {
        SpendCapEnforcer::new(
            Arc::clone(db),
            CapDefaults {
                daily: 10.0,
                monthly: 100.0,
            },
        )
    }

    #[test]
    fn test_under_cap_is_allowed_without_reason() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();

        let check = enforcer(&db).check("0xabc", now).unwrap();
        assert!(check.allowed);
        assert!(check.reason.is_none());
        assert_eq!(check.daily_spend, 0.0);
        assert_eq!(check.daily_cap, 10.0);
        assert_eq!(check.monthly_cap, 100.0);
    }

    #[test]
    fn test_over_daily_cap_is_denied_with_reason() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.upsert_subject_settings("0xabc", Some(Some(0.10)), None, None, now)
            .unwrap();
        db.record_usage(
            "0xabc",
            UsageOperation::Compute,
            0.15,
            None,
            &serde_json::json!({}),
            now - Duration::hours(1),
        )
        .unwrap();

        let check = enforcer(&db).check("0xabc", now).unwrap();
        assert!(!check.allowed);
        let reason = check.reason.expect("denial reason");
        assert!(reason.contains("Daily spend cap"), "got: {}", reason);
    }

    #[test]
    fn test_spend_outside_the_window_does_not_count() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.upsert_subject_settings("0xabc", Some(Some(0.10)), None, None, now)
            .unwrap();
        // 25 hours old: outside the rolling day, inside the rolling month
        db.record_usage(
            "0xabc",
            UsageOperation::Compute,
            0.15,
            None,
            &serde_json::json!({}),
            now - Duration::hours(25),
        )
        .unwrap();

        let check = enforcer(&db).check("0xabc", now).unwrap();
        assert!(check.allowed);
        assert_eq!(check.daily_spend, 0.0);
        assert_eq!(check.monthly_spend, 0.15);
    }

    #[test]
    fn test_monthly_cap_denies_even_when_daily_is_fine() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.upsert_subject_settings("0xabc", None, Some(Some(1.0)), None, now)
            .unwrap();
        db.record_usage(
            "0xabc",
            UsageOperation::Compute,
            1.5,
            None,
            &serde_json::json!({}),
            now - Duration::days(10),
        )
        .unwrap();

        let check = enforcer(&db).check("0xabc", now).unwrap();
        assert!(!check.allowed);
        assert!(check.reason.unwrap().contains("Monthly spend cap"));
    }

    #[test]
    fn test_snapshot_warns_when_approaching_a_cap() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.record_usage(
            "0xabc",
            UsageOperation::Compute,
            8.5,
            None,
            &serde_json::json!({}),
            now - Duration::hours(1),
        )
        .unwrap();

        // 8.5 / 10.0 = 85%: allowed, but flagged
        let snapshot = enforcer(&db).check("0xabc", now).unwrap().into_snapshot();
        assert!(!snapshot.cap_exceeded);
        assert!(snapshot.warning.unwrap().contains("Approaching daily"));
    }

    #[test]
    fn test_snapshot_is_quiet_well_below_caps() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let snapshot = enforcer(&db)
            .check("0xabc", Utc::now())
            .unwrap()
            .into_snapshot();
        assert!(!snapshot.cap_exceeded);
        assert!(snapshot.warning.is_none());
    }
}
