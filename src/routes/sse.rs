use std::convert::Infallible;

use axum::{
    Extension, Router,
    extract::{Path, State},
    middleware,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::auth,
    services::{identity::Identity, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/games/{id}/events",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Game event stream, starting with a `game.snapshot` event", content_type = "text/event-stream", body = String),
        (status = 403, description = "Caller never joined the game")
    )
)]
/// Stream the live events of a game to one of its participants.
pub async fn game_stream(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_game(&state, &identity, id).await?;
    info!(game_id = %id, subject = %identity.subject, "new game SSE connection");
    Ok(sse_service::to_sse_stream(subscription, id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/games/{id}/events", get(game_stream))
        .route_layer(middleware::from_fn(auth::require_identity))
}
