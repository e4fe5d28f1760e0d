use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::settings::{
        EmailPreferencesResponse, SubmitFeedbackRequest, UpdateEmailPreferencesRequest,
    },
    error::AppError,
    routes::auth,
    services::{feedback_service, identity::Identity, preferences_service},
    state::SharedState,
};

/// Email preference and feedback endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/settings/email",
            get(get_email_preferences).put(update_email_preferences),
        )
        .route("/settings/feedback", post(submit_feedback))
        .route_layer(middleware::from_fn(auth::require_identity))
}

/// Read the caller's email opt-ins.
#[utoipa::path(
    get,
    path = "/settings/email",
    tag = "settings",
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses((status = 200, description = "Current preferences", body = EmailPreferencesResponse))
)]
pub async fn get_email_preferences(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<EmailPreferencesResponse>, AppError> {
    Ok(Json(
        preferences_service::get_email_preferences(&state, &identity).await?,
    ))
}

/// Replace the caller's email opt-ins.
#[utoipa::path(
    put,
    path = "/settings/email",
    tag = "settings",
    request_body = UpdateEmailPreferencesRequest,
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses((status = 200, description = "Updated preferences", body = EmailPreferencesResponse))
)]
pub async fn update_email_preferences(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<UpdateEmailPreferencesRequest>,
) -> Result<Json<EmailPreferencesResponse>, AppError> {
    Ok(Json(
        preferences_service::update_email_preferences(&state, &identity, payload).await?,
    ))
}

/// Send feedback to the MathRush operators.
#[utoipa::path(
    post,
    path = "/settings/feedback",
    tag = "settings",
    request_body = SubmitFeedbackRequest,
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses(
        (status = 204, description = "Feedback forwarded"),
        (status = 400, description = "Empty or oversized message"),
        (status = 404, description = "Caller has no player profile"),
        (status = 502, description = "Email provider rejected the message")
    )
)]
pub async fn submit_feedback(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    feedback_service::submit_feedback(&state, &identity, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
