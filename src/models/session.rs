use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bearer session issued to an authenticated subject. Agents and the
/// dashboard both present the token, the subject is derived server-side.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id: i64,
    pub token: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    #[allow(dead_code)]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
