use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::player::{
        LeaderboardEntry, LeaderboardQuery, PlayerCard, PlayerResponse, RegisterPlayerRequest,
        SearchQuery,
    },
    error::AppError,
    routes::auth,
    services::{identity::Identity, player_service},
    state::SharedState,
};

/// Player profile endpoints. The leaderboard is public, everything else needs an identity.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(register_player))
        .route("/players/me", get(current_player))
        .route("/players/me/activity", post(touch_activity))
        .route("/players/search", get(search_players))
        .route_layer(middleware::from_fn(auth::require_identity))
        .route("/players/leaderboard", get(leaderboard))
}

/// Create the caller's player profile.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = RegisterPlayerRequest,
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses(
        (status = 200, description = "Player registered", body = PlayerResponse),
        (status = 400, description = "Invalid username or missing email"),
        (status = 409, description = "Player or username already exists")
    )
)]
pub async fn register_player(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<RegisterPlayerRequest>,
) -> Result<Json<PlayerResponse>, AppError> {
    payload.validate()?;
    let player = player_service::register_player(&state, &identity, &payload.username).await?;
    Ok(Json(player))
}

/// Return the caller's player profile.
#[utoipa::path(
    get,
    path = "/players/me",
    tag = "players",
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses(
        (status = 200, description = "Caller's profile", body = PlayerResponse),
        (status = 404, description = "Caller has not registered yet")
    )
)]
pub async fn current_player(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<PlayerResponse>, AppError> {
    player_service::current_player(&state, &identity)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("player not found".into()))
}

/// Refresh the caller's last activity timestamp.
#[utoipa::path(
    post,
    path = "/players/me/activity",
    tag = "players",
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses((status = 204, description = "Activity recorded"))
)]
pub async fn touch_activity(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, AppError> {
    player_service::touch_last_active(&state, &identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Top players by lifetime score.
#[utoipa::path(
    get,
    path = "/players/leaderboard",
    tag = "players",
    params(LeaderboardQuery),
    responses((status = 200, description = "Global leaderboard", body = [LeaderboardEntry]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    Json(player_service::leaderboard(&state, query.limit).await)
}

/// Find players by username prefix.
#[utoipa::path(
    get,
    path = "/players/search",
    tag = "players",
    params(
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller"),
        SearchQuery
    ),
    responses((status = 200, description = "Matching players", body = [PlayerCard]))
)]
pub async fn search_players(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<PlayerCard>> {
    Json(player_service::search_players(&state, &query.q).await)
}
