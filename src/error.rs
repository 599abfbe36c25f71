//! Error taxonomy for the sync/metering API.
//!
//! Engine and store layers return `ApiError`; controllers translate it into
//! the JSON error bodies the dashboard and agent expect. Store failures are
//! retryable and deliberately kept distinct from "not found".

use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Fixed-window budget for this (subject, operation) is exhausted.
    #[error("rate limit exceeded for {operation}")]
    RateLimited { operation: &'static str },

    /// Malformed input; rejected before any state is touched.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Optimistic-lock mismatch on a config write. Carries the authoritative
    /// timestamp so the caller can re-fetch and retry.
    #[error("config was modified since last read")]
    Conflict { current_updated_at: DateTime<Utc> },

    /// Subject-scoped lookup matched nothing.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The persistent store itself failed; retryable.
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Map the taxonomy onto an HTTP response with a JSON error body.
    pub fn to_response(&self) -> HttpResponse {
        match self {
            ApiError::RateLimited { operation } => {
                HttpResponse::TooManyRequests().json(serde_json::json!({
                    "error": format!("Rate limit exceeded for {}", operation),
                }))
            }
            ApiError::Validation { field, message } => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("Invalid {}: {}", field, message),
                    "field": field,
                }))
            }
            ApiError::Conflict { current_updated_at } => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "Config was modified since last read",
                    "current_updated_at": current_updated_at,
                }))
            }
            ApiError::NotFound { entity } => HttpResponse::NotFound().json(serde_json::json!({
                "error": format!("{} not found", entity),
            })),
            ApiError::Store(e) => {
                log::error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error",
                    "retryable": true,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_names_field() {
        let err = ApiError::validation("status", "must be one of online, thinking, idle, offline");
        assert_eq!(
            err.to_string(),
            "invalid status: must be one of online, thinking, idle, offline"
        );
    }

    #[test]
    fn test_store_error_from_rusqlite() {
        let err = ApiError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, ApiError::Store(_)));
    }
}
