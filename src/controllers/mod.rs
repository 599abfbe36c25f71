pub mod agent_status;
pub mod agent_sync;
pub mod health;
pub mod heartbeat;
pub mod settings;
pub mod skill_configs;
pub mod spending;


use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

/// Shared session validation for controller handlers. Returns the subject
/// the session is bound to; every operation below is scoped by it.
pub fn resolve_subject(
    state: &web::Data<AppState>,
    req: &HttpRequest,
) -> Result<String, HttpResponse> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string());

    let token = match token {
        Some(t) => t,
        None => {
            return Err(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "No authorization token provided"
            })));
        }
    };

    match state.db.validate_session(&token) {
        Ok(Some(session)) => Ok(session.subject),
        Ok(None) => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid or expired session"
        }))),
        Err(e) => {
            log::error!("Session validation error: {}", e);
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })))
        }
    }
}
