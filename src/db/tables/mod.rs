//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

pub mod agent_status; // agent_status (presence + billing session)
pub mod skill_configs; // skill_configs (config rows + sync lifecycle)
pub mod subject_settings; // subject_settings (spend caps, sync toggle)
pub mod usage_ledger; // usage_ledger (append-only metering entries)
