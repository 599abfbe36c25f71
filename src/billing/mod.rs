//! Compute metering and spend-cap evaluation.

pub mod meter;
pub mod spend;

pub use meter::HeartbeatMeter;
pub use spend::{CapDefaults, SpendCapEnforcer};
