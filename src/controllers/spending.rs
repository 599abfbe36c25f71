use crate::controllers::resolve_subject;
use crate::error::ApiError;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

/// GET /api/spending
pub async fn get_spending(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.spend.check(&subject, Utc::now()) {
        Ok(check) => HttpResponse::Ok().json(check.into_snapshot()),
        Err(e) => e.to_response(),
    }
}

/// GET /api/spending/history?days=N
///
/// Per-day totals for the trailing window, oldest first. `days` is clamped
/// to 1..=90 and defaults to 30.
pub async fn get_spending_history(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let days = query.days.unwrap_or(30).clamp(1, 90);
    let start = Utc::now() - Duration::days(days);

    match state.db.usage_by_day(&subject, start) {
        Ok(rows) => HttpResponse::Ok().json(serde_json::json!({ "days": rows })),
        Err(e) => ApiError::from(e).to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/spending")
            .route("", web::get().to(get_spending))
            .route("/history", web::get().to(get_spending_history)),
    );
}
