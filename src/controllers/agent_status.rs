use crate::controllers::resolve_subject;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;

/// GET /api/agent/status
///
/// Dashboard read of the agent's last-known state. A subject that has never
/// sent a heartbeat reads as offline rather than 404.
pub async fn get_status(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.status_tracker.current(&subject, Utc::now()) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => e.to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/agent/status").route(web::get().to(get_status)));
}
