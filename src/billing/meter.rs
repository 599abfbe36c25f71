//! Converts heartbeat gaps into billed compute minutes.
//!
//! Billing is observation-based: time only accrues between two heartbeats
//! whose earlier one left the agent in a non-offline status, and a gap is
//! clamped to five minutes so missed heartbeats never bill unobserved
//! downtime.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::billing::spend::{SpendCapEnforcer, SpendingSnapshot};
use crate::db::Database;
use crate::error::ApiError;
use crate::models::{AgentStatus, AgentStatusRecord, UsageOperation};

/// Longest gap that can bill, in seconds.
const MAX_BILLABLE_GAP_SECS: i64 = 300;
/// Floored gaps below this are absorbed into the next measurement.
const MIN_BILLABLE_MINUTES: f64 = 0.1;

pub struct HeartbeatMeter {
    db: Arc<Database>,
    spend: Arc<SpendCapEnforcer>,
    cost_per_minute: f64,
}

/// What one heartbeat did: the status row as written, the minutes charged
/// (zero when below threshold or not billable), and the spend picture the
/// agent uses to self-throttle.
pub struct HeartbeatOutcome {
    pub record: AgentStatusRecord,
    pub compute_minutes_billed: f64,
    pub spending: SpendingSnapshot,
}

impl HeartbeatMeter {
    pub fn new(db: Arc<Database>, spend: Arc<SpendCapEnforcer>, cost_per_minute: f64) -> Self {
        Self {
            db,
            spend,
            cost_per_minute,
        }
    }

    /// Clamp to the billable ceiling, then floor to one-tenth-minute
    /// granularity. Integer division keeps the result exact.
    fn billable_minutes(elapsed_secs: i64) -> f64 {
        let tenths = elapsed_secs.clamp(0, MAX_BILLABLE_GAP_SECS) / 6;
        tenths as f64 / 10.0
    }

    pub fn beat(
        &self,
        subject: &str,
        status: AgentStatus,
        session_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatOutcome, ApiError> {
        let previous = self.db.get_agent_status(subject)?;

        // Bill the observed gap when the agent was last seen running
        let mut elapsed_secs = 0i64;
        let mut minutes = 0.0;
        if let Some(prev) = previous.as_ref() {
            if prev.status != AgentStatus::Offline {
                if let Some(last) = prev.last_heartbeat {
                    elapsed_secs = (now - last).num_seconds();
                    minutes = Self::billable_minutes(elapsed_secs);
                }
            }
        }

        let mut compute_minutes_billed = 0.0;
        if minutes >= MIN_BILLABLE_MINUTES {
            let cost = minutes * self.cost_per_minute;
            let metadata = serde_json::json!({
                "minutes": minutes,
                "elapsed_secs": elapsed_secs,
            });
            match self
                .db
                .record_usage(subject, UsageOperation::Compute, cost, None, &metadata, now)
            {
                Ok(entry) => {
                    compute_minutes_billed = minutes;
                    log::debug!(
                        "[METER] billed {:.1} min (${:.4}) to {} (entry {})",
                        minutes,
                        cost,
                        subject,
                        entry.id
                    );
                }
                Err(e) => {
                    // The beat still succeeds; the charge is the only loss
                    log::error!("[METER] failed to record compute charge for {}: {}", subject, e);
                }
            }
        }

        // Liveness entry, always, at zero cost
        let heartbeat_meta = serde_json::json!({ "status": status.as_ref() });
        if let Err(e) = self.db.record_usage(
            subject,
            UsageOperation::Heartbeat,
            0.0,
            None,
            &heartbeat_meta,
            now,
        ) {
            log::error!("[METER] failed to record heartbeat entry for {}: {}", subject, e);
        }

        // Session bookkeeping: offline closes, entering an active status
        // with no open session opens one, everything else carries
        let (session_id, session_start) = if status == AgentStatus::Offline {
            (None, None)
        } else {
            let (carried_id, carried_start) = match previous.as_ref() {
                Some(p) if p.status != AgentStatus::Offline => (p.session_id, p.session_start),
                _ => (None, None),
            };

            if status.is_active() && carried_start.is_none() {
                (Some(session_id.unwrap_or_else(Uuid::new_v4)), Some(now))
            } else {
                (carried_id, carried_start)
            }
        };

        let record = AgentStatusRecord {
            subject: subject.to_string(),
            status,
            last_heartbeat: Some(now),
            session_id,
            session_start,
        };
        self.db.upsert_agent_status(&record)?;

        let spending = self.spend.check(subject, now)?.into_snapshot();

        Ok(HeartbeatOutcome {
            record,
            compute_minutes_billed,
            spending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::spend::CapDefaults;
    use chrono::Duration;

    const COST_PER_MINUTE: f64 = 0.05;

    fn meter(db: &Arc<Database>) -> HeartbeatMeter {
        let spend = Arc::new(SpendCapEnforcer::new(
            Arc::clone(db),
            CapDefaults {
                daily: 10.0,
                monthly: 100.0,
            },
        ));
        HeartbeatMeter::new(Arc::clone(db), spend, COST_PER_MINUTE)
    }

    fn seed_status(
        db: &Database,
        subject: &str,
        status: AgentStatus,
        last_heartbeat: DateTime<Utc>,
    ) {
        db.upsert_agent_status(&AgentStatusRecord {
            subject: subject.to_string(),
            status,
            last_heartbeat: Some(last_heartbeat),
            session_id: Some(Uuid::new_v4()),
            session_start: Some(last_heartbeat),
        })
        .unwrap();
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_first_heartbeat_bills_nothing_and_opens_session() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 0.0);
        assert_eq!(outcome.record.status, AgentStatus::Online);
        assert_eq!(outcome.record.last_heartbeat, Some(now));
        assert!(outcome.record.session_id.is_some());
        assert_eq!(outcome.record.session_start, Some(now));

        // Only the zero-cost liveness entry was written
        let summary = db
            .summarize_usage("0xabc", now - Duration::hours(1), now)
            .unwrap();
        assert_eq!(summary.operation_count, 1);
        assert_close(summary.total_cost, 0.0);
    }

    #[test]
    fn test_37_second_gap_bills_six_tenths() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        seed_status(&db, "0xabc", AgentStatus::Online, now - Duration::seconds(37));

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 0.6);
        assert_close(outcome.spending.daily_spend, 0.6 * COST_PER_MINUTE);
    }

    #[test]
    fn test_61_second_gap_bills_exactly_one_minute() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        seed_status(&db, "0xabc", AgentStatus::Online, now - Duration::seconds(61));

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 1.0);
    }

    #[test]
    fn test_long_gap_is_clamped_to_five_minutes() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        seed_status(&db, "0xabc", AgentStatus::Online, now - Duration::seconds(1000));

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 5.0);
    }

    #[test]
    fn test_sub_threshold_gap_is_absorbed_but_clock_advances() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        seed_status(&db, "0xabc", AgentStatus::Online, now - Duration::seconds(5));

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 0.0);
        // last_heartbeat advanced anyway, so the 5s fold into the next gap
        assert_eq!(outcome.record.last_heartbeat, Some(now));
    }

    #[test]
    fn test_gap_after_offline_is_not_billed() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.upsert_agent_status(&AgentStatusRecord {
            subject: "0xabc".to_string(),
            status: AgentStatus::Offline,
            last_heartbeat: Some(now - Duration::seconds(120)),
            session_id: None,
            session_start: None,
        })
        .unwrap();

        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 0.0);
    }

    #[test]
    fn test_idle_time_still_bills() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        seed_status(&db, "0xabc", AgentStatus::Idle, now - Duration::seconds(60));

        // Idle is a running process; only offline gaps are free
        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 1.0);
    }

    #[test]
    fn test_session_persists_across_heartbeats() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let m = meter(&db);
        let t0 = Utc::now();

        let first = m.beat("0xabc", AgentStatus::Online, None, t0).unwrap();
        let second = m
            .beat("0xabc", AgentStatus::Thinking, None, t0 + Duration::seconds(30))
            .unwrap();

        assert_eq!(second.record.session_id, first.record.session_id);
        assert_eq!(second.record.session_start, Some(t0));
    }

    #[test]
    fn test_offline_clears_session_and_next_online_opens_a_new_one() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let m = meter(&db);
        let t0 = Utc::now();

        let first = m.beat("0xabc", AgentStatus::Online, None, t0).unwrap();
        let offline = m
            .beat("0xabc", AgentStatus::Offline, None, t0 + Duration::seconds(30))
            .unwrap();
        assert!(offline.record.session_id.is_none());
        assert!(offline.record.session_start.is_none());

        let again = m
            .beat("0xabc", AgentStatus::Online, None, t0 + Duration::seconds(60))
            .unwrap();
        assert_ne!(again.record.session_id, first.record.session_id);
        assert_eq!(again.record.session_start, Some(t0 + Duration::seconds(60)));
    }

    #[test]
    fn test_idle_carries_the_open_session() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let m = meter(&db);
        let t0 = Utc::now();

        let first = m.beat("0xabc", AgentStatus::Online, None, t0).unwrap();
        let idle = m
            .beat("0xabc", AgentStatus::Idle, None, t0 + Duration::seconds(30))
            .unwrap();

        assert_eq!(idle.record.session_id, first.record.session_id);
        assert_eq!(idle.record.session_start, Some(t0));
    }

    #[test]
    fn test_client_session_id_is_used_when_opening() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let wanted = Uuid::new_v4();

        let outcome = meter(&db)
            .beat("0xabc", AgentStatus::Online, Some(wanted), Utc::now())
            .unwrap();
        assert_eq!(outcome.record.session_id, Some(wanted));
    }

    #[test]
    fn test_capped_subject_still_bills_and_sees_the_denial() {
        let db = Arc::new(Database::new(":memory:").expect("in-memory db"));
        let now = Utc::now();
        db.upsert_subject_settings("0xabc", Some(Some(0.01)), None, None, now)
            .unwrap();
        db.record_usage(
            "0xabc",
            UsageOperation::Compute,
            0.02,
            None,
            &serde_json::json!({}),
            now - Duration::hours(1),
        )
        .unwrap();
        seed_status(&db, "0xabc", AgentStatus::Online, now - Duration::seconds(61));

        // The cap is advisory here: the charge lands, and the response
        // carries the denial so the agent can stop itself
        let outcome = meter(&db).beat("0xabc", AgentStatus::Online, None, now).unwrap();
        assert_close(outcome.compute_minutes_billed, 1.0);
        assert!(outcome.spending.cap_exceeded);
        assert!(outcome.spending.warning.unwrap().contains("Daily spend cap"));
    }
}
