use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::question::{AnswerOutcome, AnswerRequest, NextQuestionResponse},
    error::AppError,
    routes::auth,
    services::{identity::Identity, question_service},
    state::SharedState,
};

/// Question serving and answering during an active round.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/questions/next", post(next_question))
        .route("/games/{id}/answers", post(submit_answer))
        .route_layer(middleware::from_fn(auth::require_identity))
}

/// Serve the caller's next question, or the one still waiting for an answer.
#[utoipa::path(
    post,
    path = "/games/{id}/questions/next",
    tag = "questions",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Next question, empty when the pool is exhausted", body = NextQuestionResponse),
        (status = 409, description = "Game not playable or question allowance used up")
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<NextQuestionResponse>, AppError> {
    Ok(Json(
        question_service::get_next_question(&state, &identity, id).await?,
    ))
}

/// Record the caller's answer to a served question.
#[utoipa::path(
    post,
    path = "/games/{id}/answers",
    tag = "questions",
    request_body = AnswerRequest,
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("X-User-Id" = String, Header, description = "Subject of the authenticated caller")
    ),
    responses(
        (status = 200, description = "Answer scored", body = AnswerOutcome),
        (status = 404, description = "Question was not served or is already answered")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, AppError> {
    payload.validate()?;
    Ok(Json(
        question_service::update_answer(&state, &identity, id, payload).await?,
    ))
}
