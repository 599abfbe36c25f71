use crate::controllers::resolve_subject;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ConfigWriteRequest {
    pub skill_slug: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub config_source: Option<String>,
    #[serde(default)]
    pub expected_updated_at: Option<String>,
}

/// PUT /api/skills/configs
///
/// Dashboard upsert. `expected_updated_at` is the optimistic lock: when it
/// no longer matches the stored row the write is rejected with 409 and the
/// authoritative timestamp.
pub async fn put_config(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ConfigWriteRequest>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.sync_engine.write(
        &subject,
        &body.skill_slug,
        body.enabled,
        body.config.as_ref(),
        body.config_source.as_deref(),
        body.expected_updated_at.as_deref(),
        Utc::now(),
    ) {
        Ok(config) => HttpResponse::Ok().json(serde_json::json!({ "config": config })),
        Err(e) => e.to_response(),
    }
}

/// GET /api/skills/configs
pub async fn list_configs(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.sync_engine.list(&subject) {
        Ok(configs) => HttpResponse::Ok().json(serde_json::json!({ "configs": configs })),
        Err(e) => e.to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/skills/configs")
            .route(web::get().to(list_configs))
            .route(web::put().to(put_config)),
    );
}
