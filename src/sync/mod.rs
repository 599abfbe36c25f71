//! Config delivery between dashboard and agent.

pub mod engine;

pub use engine::ConfigSyncEngine;
