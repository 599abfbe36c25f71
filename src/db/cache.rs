//! Read-through cache for hot settings lookups.
//!
//! Subject settings are read on every heartbeat and every config pull; the
//! cache keeps those off the connection mutex. Writes invalidate, and a
//! short TTL bounds staleness if an invalidation is ever missed.

use moka::sync::Cache;
use std::time::Duration;

use crate::models::SubjectSettings;

const SETTINGS_TTL_SECS: u64 = 60;
const SETTINGS_MAX_CAPACITY: u64 = 10_000;

pub struct DbCache {
    // Outer Option distinguishes a cache miss from a cached "no row".
    subject_settings: Cache<String, Option<SubjectSettings>>,
}

impl DbCache {
    pub fn new() -> Self {
        Self {
            subject_settings: Cache::builder()
                .max_capacity(SETTINGS_MAX_CAPACITY)
                .time_to_live(Duration::from_secs(SETTINGS_TTL_SECS))
                .build(),
        }
    }

    pub fn get_subject_settings(&self, subject: &str) -> Option<Option<SubjectSettings>> {
        self.subject_settings.get(subject)
    }

    pub fn set_subject_settings(&self, subject: &str, settings: Option<SubjectSettings>) {
        self.subject_settings.insert(subject.to_string(), settings);
    }

    pub fn invalidate_subject_settings(&self, subject: &str) {
        self.subject_settings.invalidate(subject);
    }
}

impl Default for DbCache {
    fn default() -> Self {
        Self::new()
    }
}
