use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};

use crate::{
    dto::webhook::{EmailEventPayload, WebhookAck},
    error::AppError,
    services::invitation_service,
    state::SharedState,
};

const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Delivery callbacks from the email provider.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/webhooks/email", post(email_event))
        .route_layer(middleware::from_fn_with_state(state, require_webhook_token))
}

/// Apply an email delivery event to the matching invitations.
#[utoipa::path(
    post,
    path = "/webhooks/email",
    tag = "webhooks",
    request_body = EmailEventPayload,
    params(("X-Webhook-Token" = Option<String>, Header, description = "Shared secret, required when configured")),
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 401, description = "Missing or wrong webhook token")
    )
)]
pub async fn email_event(
    State(state): State<SharedState>,
    Json(payload): Json<EmailEventPayload>,
) -> Result<Json<WebhookAck>, AppError> {
    let updated = invitation_service::handle_email_event(&state, payload).await?;
    Ok(Json(WebhookAck { updated }))
}

async fn require_webhook_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config().webhook_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing webhook token header `X-Webhook-Token`".into())
        })?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid webhook token".into()))
    }
}
