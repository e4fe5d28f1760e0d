use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::game::{
        CreateGameRequest, CreateGameResponse, GameOverRequest, GameOverResponse, GameResultEntry,
        GameView, HistoryEntry, JoinGameRequest, JoinGameResponse, StartGameResponse,
    },
    error::AppError,
    routes::auth,
    services::{game_service, identity::Identity},
    state::SharedState,
};

/// Game lifecycle endpoints: creation, joining, start, leave and end of round.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/join", post(join_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/leave", post(leave_game))
        .route("/games/{id}/game-over", post(report_game_over))
        .route("/games/{id}/results", get(game_results))
        .route("/games/{id}/history", get(participant_history))
        .route_layer(middleware::from_fn(auth::require_identity))
}

/// Create a waiting game hosted by the caller.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses(
        (status = 200, description = "Game created", body = CreateGameResponse),
        (status = 503, description = "No invite code could be allocated")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, AppError> {
    payload.validate()?;
    let created = game_service::create_game(&state, &identity, payload).await?;
    Ok(Json(created))
}

/// Join a waiting game with its invite code.
#[utoipa::path(
    post,
    path = "/games/join",
    tag = "games",
    request_body = JoinGameRequest,
    params(("X-User-Id" = String, Header, description = "Subject of the authenticated caller")),
    responses(
        (status = 200, description = "Joined", body = JoinGameResponse),
        (status = 404, description = "Unknown invite code or game already started")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, AppError> {
    payload.validate()?;
    let joined = game_service::join_game_by_code(&state, &identity, &payload.invite_code).await?;
    Ok(Json(joined))
}

/// Read a game as seen by one of its participants.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Game view", body = GameView),
        (status = 403, description = "Caller never joined the game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::get_game(&state, &identity, id).await?))
}

/// Start the round; host only.
#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Round started", body = StartGameResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Game is not waiting")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartGameResponse>, AppError> {
    Ok(Json(game_service::start_game(&state, &identity, id).await?))
}

/// Leave the game; the participant row stays for the results.
#[utoipa::path(
    post,
    path = "/games/{id}/leave",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses((status = 204, description = "Participant marked inactive"))
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::mark_participant_inactive(&state, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Report that the client countdown ran out.
#[utoipa::path(
    post,
    path = "/games/{id}/game-over",
    tag = "games",
    request_body = GameOverRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses((status = 200, description = "Finish applied or scheduled", body = GameOverResponse))
)]
pub async fn report_game_over(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GameOverRequest>,
) -> Result<Json<GameOverResponse>, AppError> {
    let response =
        game_service::report_game_over(&state, &identity, id, payload.time_left_secs).await?;
    Ok(Json(response))
}

/// Scoreboard of a game, best score first.
#[utoipa::path(
    get,
    path = "/games/{id}/results",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses((status = 200, description = "Scoreboard", body = [GameResultEntry]))
)]
pub async fn game_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GameResultEntry>>, AppError> {
    Ok(Json(game_service::game_results(&state, id).await?))
}

/// Questions served to the caller in this game, with their answers.
#[utoipa::path(
    get,
    path = "/games/{id}/history",
    tag = "games",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses((status = 200, description = "Answer history", body = [HistoryEntry]))
)]
pub async fn participant_history(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    Ok(Json(
        game_service::participant_history(&state, &identity, id).await?,
    ))
}
