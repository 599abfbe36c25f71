use crate::controllers::resolve_subject;
use crate::error::ApiError;
use crate::models::SubjectSettings;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::{Deserialize, Deserializer};

/// Distinguish an absent cap field from an explicit null: absent keeps the
/// stored value, null clears the cap back to the server default.
fn deserialize_nullable_cap<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdateRequest {
    #[serde(default, deserialize_with = "deserialize_nullable_cap")]
    pub daily_cap: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_nullable_cap")]
    pub monthly_cap: Option<Option<f64>>,
    #[serde(default)]
    pub sync_enabled: Option<bool>,
}

/// Effective view sent to the dashboard: stored caps fall back to the
/// server defaults so the UI always has concrete numbers to show.
fn settings_body(state: &web::Data<AppState>, settings: Option<&SubjectSettings>) -> HttpResponse {
    let (daily_cap, monthly_cap) = settings
        .map(|s| {
            s.effective_caps(
                state.config.default_daily_cap,
                state.config.default_monthly_cap,
            )
        })
        .unwrap_or((
            state.config.default_daily_cap,
            state.config.default_monthly_cap,
        ));
    let sync_enabled = settings.map(|s| s.sync_enabled).unwrap_or(true);

    HttpResponse::Ok().json(serde_json::json!({
        "daily_cap": daily_cap,
        "monthly_cap": monthly_cap,
        "sync_enabled": sync_enabled,
    }))
}

fn validate_cap(field: &'static str, cap: Option<Option<f64>>) -> Result<(), ApiError> {
    if let Some(Some(value)) = cap {
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::validation(field, "must be a non-negative number"));
        }
    }
    Ok(())
}

/// GET /api/settings
pub async fn get_settings(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match state.db.get_subject_settings(&subject) {
        Ok(settings) => settings_body(&state, settings.as_ref()),
        Err(e) => ApiError::from(e).to_response(),
    }
}

/// PUT /api/settings
pub async fn put_settings(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SettingsUpdateRequest>,
) -> impl Responder {
    let subject = match resolve_subject(&state, &req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if let Err(e) = validate_cap("daily_cap", body.daily_cap) {
        return e.to_response();
    }
    if let Err(e) = validate_cap("monthly_cap", body.monthly_cap) {
        return e.to_response();
    }

    match state.db.upsert_subject_settings(
        &subject,
        body.daily_cap,
        body.monthly_cap,
        body.sync_enabled,
        Utc::now(),
    ) {
        Ok(settings) => settings_body(&state, Some(&settings)),
        Err(e) => ApiError::from(e).to_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/settings")
            .route(web::get().to(get_settings))
            .route(web::put().to(put_settings)),
    );
}
