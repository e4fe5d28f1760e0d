use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::invitation::{SendInvitationsRequest, SendInvitationsResponse},
    error::AppError,
    routes::auth,
    services::{identity::Identity, invitation_service},
    state::SharedState,
};

/// Email invitations sent by hosts.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/invitations", post(send_invitations))
        .route_layer(middleware::from_fn(auth::require_identity))
}

/// Email the invite code of a waiting game to a list of addresses.
#[utoipa::path(
    post,
    path = "/games/{id}/invitations",
    tag = "invitations",
    request_body = SendInvitationsRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Every invitation was sent", body = SendInvitationsResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 502, description = "The email provider rejected an invitation; later addresses were skipped")
    )
)]
pub async fn send_invitations(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendInvitationsRequest>,
) -> Result<Json<SendInvitationsResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        invitation_service::send_game_invitations(&state, &identity, id, payload).await?,
    ))
}
