use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::game::GameResultEntry, state::state_machine::FinishReason};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already serialised payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player enters the lobby.
pub struct ParticipantJoinedEvent {
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub username: String,
    pub profile_icon: String,
    pub profile_color: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player leaves the game.
pub struct ParticipantLeftEvent {
    pub game_id: Uuid,
    pub player_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the host starts the round.
pub struct GameStartedEvent {
    pub game_id: Uuid,
    pub deadline_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after every accepted answer.
pub struct ScoreUpdatedEvent {
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub score: i64,
    pub questions_served: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once, when the game ends.
pub struct GameFinishedEvent {
    pub game_id: Uuid,
    pub reason: FinishReason,
    pub results: Vec<GameResultEntry>,
}
