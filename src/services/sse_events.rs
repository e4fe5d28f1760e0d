use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::PlayerEntity,
    dto::{
        game::GameResultEntry,
        sse::{
            GameFinishedEvent, GameStartedEvent, ParticipantJoinedEvent, ParticipantLeftEvent,
            ScoreUpdatedEvent, ServerEvent,
        },
    },
    state::{SharedState, state_machine::FinishReason},
};

pub(crate) const EVENT_GAME_SNAPSHOT: &str = "game.snapshot";
const EVENT_PARTICIPANT_JOINED: &str = "participant.joined";
const EVENT_PARTICIPANT_LEFT: &str = "participant.left";
const EVENT_GAME_STARTED: &str = "game.started";
const EVENT_SCORE_UPDATED: &str = "score.updated";
const EVENT_GAME_FINISHED: &str = "game.finished";

/// Broadcast that a player entered the lobby.
pub fn broadcast_participant_joined(state: &SharedState, game_id: Uuid, player: &PlayerEntity) {
    let payload = ParticipantJoinedEvent {
        game_id,
        player_id: player.id,
        username: player.username.clone(),
        profile_icon: player.profile_icon.clone(),
        profile_color: player.profile_color.clone(),
    };
    send_game_event(state, game_id, EVENT_PARTICIPANT_JOINED, &payload);
}

/// Broadcast that a player left the game.
pub fn broadcast_participant_left(state: &SharedState, game_id: Uuid, player_id: Uuid) {
    let payload = ParticipantLeftEvent { game_id, player_id };
    send_game_event(state, game_id, EVENT_PARTICIPANT_LEFT, &payload);
}

/// Broadcast the start of the round.
pub fn broadcast_game_started(state: &SharedState, game_id: Uuid, deadline_at: String) {
    let payload = GameStartedEvent {
        game_id,
        deadline_at,
    };
    send_game_event(state, game_id, EVENT_GAME_STARTED, &payload);
}

/// Broadcast a participant's score after an answer.
pub fn broadcast_score_updated(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    score: i64,
    questions_served: u32,
) {
    let payload = ScoreUpdatedEvent {
        game_id,
        player_id,
        score,
        questions_served,
    };
    send_game_event(state, game_id, EVENT_SCORE_UPDATED, &payload);
}

/// Broadcast the final scoreboard.
pub fn broadcast_game_finished(
    state: &SharedState,
    game_id: Uuid,
    reason: FinishReason,
    results: Vec<GameResultEntry>,
) {
    let payload = GameFinishedEvent {
        game_id,
        reason,
        results,
    };
    send_game_event(state, game_id, EVENT_GAME_FINISHED, &payload);
}

fn send_game_event(state: &SharedState, game_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.game_channels().publish(game_id, event),
        Err(err) => warn!(%game_id, event, error = %err, "failed to serialize game SSE payload"),
    }
}
