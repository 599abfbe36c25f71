use crate::controllers::resolve_subject;
use crate::error::ApiError;
use crate::models::SyncResultEntry;
use crate::rate_limit::policies;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub include_all: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub skill_slug: String,
    pub sync_status: String,
    #[serde(default)]
    pub sync_error: Option<String>,
}

// Entries stay raw JSON so a wrong-typed field in one entry cannot fail
// extraction of the whole batch; each is decoded on its own below.
#[derive(Debug, Deserialize)]
pub struct AckBatchRequest {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// GET /api/agent/skill-configs
///
/// The agent's poll. Undelivered configs come back and flip to syncing;
/// rows stay eligible for re-delivery until an ack lands.
pub async fn pull_configs(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PullQuery>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if !state.rate_limiter.allow(&subject, &policies::CONFIG_PULL) {
        return ApiError::RateLimited {
            operation: "config_pull",
        }
        .to_response();
    }

    let include_all = query.include_all.unwrap_or(false);
    match state
        .sync_engine
        .pull(&subject, query.since.as_deref(), include_all, Utc::now())
    {
        Ok(pulled) => HttpResponse::Ok().json(pulled),
        Err(e) => e.to_response(),
    }
}

/// POST /api/agent/skill-configs/ack
pub async fn ack_config(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AckRequest>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.sync_engine.acknowledge(
        &subject,
        &body.skill_slug,
        &body.sync_status,
        body.sync_error.as_deref(),
        Utc::now(),
    ) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "message": "ok" })),
        Err(e) => e.to_response(),
    }
}

/// POST /api/agent/skill-configs/ack-batch
///
/// Malformed or unknown entries are skipped, not fatal; the response counts
/// the rows that actually moved.
pub async fn ack_configs_batch(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AckBatchRequest>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let entries: Vec<SyncResultEntry> = body
        .results
        .iter()
        .filter_map(|raw| match serde_json::from_value(raw.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("[SYNC] skipping malformed ack entry for {}: {}", subject, e);
                None
            }
        })
        .collect();

    match state
        .sync_engine
        .acknowledge_batch(&subject, &entries, Utc::now())
    {
        Ok(updated) => HttpResponse::Ok().json(serde_json::json!({ "updated": updated })),
        Err(e) => e.to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/agent/skill-configs")
            .route("", web::get().to(pull_configs))
            .route("/ack", web::post().to(ack_config))
            .route("/ack-batch", web::post().to(ack_configs_batch)),
    );
}
