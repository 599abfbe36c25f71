pub mod agent_status;
pub mod session;
pub mod skill_config;
pub mod subject_settings;
pub mod usage;

pub use agent_status::{AgentStatus, AgentStatusRecord};
pub use session::AuthSession;
pub use skill_config::{ConfigSource, SkillConfig, SyncResultEntry, SyncState};
pub use subject_settings::SubjectSettings;
pub use usage::{DailyUsage, UsageLedgerEntry, UsageOperation, UsageSummary};
