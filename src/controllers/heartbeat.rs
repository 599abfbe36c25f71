use crate::controllers::resolve_subject;
use crate::error::ApiError;
use crate::models::AgentStatus;
use crate::rate_limit::policies;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub status: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /api/agent/heartbeat
///
/// Reports liveness, bills the gap since the previous beat, and returns the
/// spend picture the agent uses to self-throttle. Rate limited before any
/// validation so a misbehaving agent cannot burn store reads.
pub async fn post_heartbeat(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<HeartbeatRequest>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if !state.rate_limiter.allow(&subject, &policies::HEARTBEAT) {
        return ApiError::RateLimited {
            operation: "heartbeat",
        }
        .to_response();
    }

    let status = match body.status.trim().parse::<AgentStatus>() {
        Ok(s) => s,
        Err(_) => {
            return ApiError::validation("status", "must be one of online, thinking, idle, offline")
                .to_response();
        }
    };

    let session_id = match body.session_id.as_deref() {
        Some(raw) => match Uuid::parse_str(raw.trim()) {
            Ok(id) if id.get_version_num() == 4 => Some(id),
            _ => {
                return ApiError::validation("session_id", "must be a version 4 UUID")
                    .to_response();
            }
        },
        None => None,
    };

    match state.meter.beat(&subject, status, session_id, Utc::now()) {
        Ok(outcome) => {
            log::debug!(
                "[HEARTBEAT] {} is {} (billed {:.1} min)",
                subject,
                outcome.record.status.as_ref(),
                outcome.compute_minutes_billed
            );
            HttpResponse::Ok().json(serde_json::json!({
                "compute_minutes_billed": outcome.compute_minutes_billed,
                "spending": outcome.spending,
            }))
        }
        Err(e) => e.to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/agent/heartbeat").route(web::post().to(post_heartbeat)));
}
