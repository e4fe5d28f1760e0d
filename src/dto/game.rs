use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        Difficulty, GameEntity, ParticipantEntity, ParticipantQuestionEntity, ParticipantStatus,
        PlayerEntity, QuestionEntity,
    },
    dto::{format_system_time, invitation::InvitationView, validation::validate_invite_code},
    state::state_machine::{FinishReason, GamePhase, GameStatus},
};

/// Payload used to create a game hosted by the caller.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Questions served to each participant.
    #[validate(range(min = 1, max = 50))]
    pub max_questions: u32,
    pub difficulty: Difficulty,
    /// Topic of the question pool, e.g. `addition`.
    #[validate(length(min = 1, max = 64))]
    pub topic: String,
}

/// Identifier and join code of a freshly created game.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateGameResponse {
    pub game_id: Uuid,
    pub invite_code: String,
}

/// Payload used to join a waiting game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGameRequest {
    #[validate(custom(function = "validate_invite_code"))]
    pub invite_code: String,
}

/// Game joined by the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinGameResponse {
    pub game_id: Uuid,
}

/// Returned once the host started the round.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartGameResponse {
    pub game_id: Uuid,
    /// RFC3339 timestamp after which the game finishes on its own.
    pub deadline_at: String,
}

/// Client report that its countdown reached the given remaining time.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GameOverRequest {
    /// Seconds left on the client countdown; zero or less finishes immediately.
    pub time_left_secs: i64,
}

/// Outcome of a game-over report.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameOverResponse {
    /// True when this report finished the game.
    pub finished: bool,
    /// Delay before the scheduled finish, when one was scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finishes_in_secs: Option<u64>,
}

/// Participant as shown in the game lobby and scoreboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantView {
    pub player_id: Uuid,
    pub username: String,
    pub profile_icon: String,
    pub profile_color: String,
    pub score: i64,
    pub current_question_count: u32,
    pub status: ParticipantStatus,
}

impl From<(&ParticipantEntity, &PlayerEntity)> for ParticipantView {
    fn from((participant, player): (&ParticipantEntity, &PlayerEntity)) -> Self {
        Self {
            player_id: player.id,
            username: player.username.clone(),
            profile_icon: player.profile_icon.clone(),
            profile_color: player.profile_color.clone(),
            score: participant.score,
            current_question_count: participant.current_question_count,
            status: participant.status,
        }
    }
}

/// Game read model. Pending invitations are only present for the host.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    pub id: Uuid,
    pub host_id: Uuid,
    pub is_host: bool,
    pub max_questions: u32,
    pub difficulty: Difficulty,
    pub topic: String,
    pub status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Participants that have not left, in join order.
    pub participants: Vec<ParticipantView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_invitations: Option<Vec<InvitationView>>,
}

impl GameView {
    /// Project a game row; `participants` and `pending_invitations` are filled by the caller.
    pub fn new(game: &GameEntity, viewer_id: Uuid) -> Self {
        let (started_at, deadline_at, finished_at, finish_reason) = match &game.phase {
            GamePhase::Waiting => (None, None, None, None),
            GamePhase::Active {
                started_at,
                deadline_at,
            } => (
                Some(format_system_time(*started_at)),
                Some(format_system_time(*deadline_at)),
                None,
                None,
            ),
            GamePhase::Finished {
                reason,
                finished_at,
            } => (None, None, Some(format_system_time(*finished_at)), Some(*reason)),
        };

        Self {
            id: game.id,
            host_id: game.host_id,
            is_host: game.host_id == viewer_id,
            max_questions: game.max_questions,
            difficulty: game.difficulty,
            topic: game.topic.clone(),
            status: game.phase.status(),
            invite_code: game.invite_code.clone(),
            created_at: format_system_time(game.created_at),
            started_at,
            deadline_at,
            finished_at,
            finish_reason,
            participants: Vec::new(),
            pending_invitations: None,
        }
    }
}

/// One line of the final scoreboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameResultEntry {
    /// 1-based position.
    pub rank: usize,
    pub player_id: Uuid,
    pub username: String,
    pub profile_icon: String,
    pub profile_color: String,
    pub score: i64,
}

/// A question served to the caller, with the recorded answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub question_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    /// Chosen option, absent while unanswered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_given_by_player: Option<u8>,
    /// Revealed once answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<u8>,
    pub score: i64,
    pub served_at: String,
}

impl HistoryEntry {
    pub(crate) fn new(row: &ParticipantQuestionEntity, question: &QuestionEntity) -> Self {
        Self {
            question_id: question.id,
            question: question.question.clone(),
            options: question.options.clone(),
            answer_given_by_player: row.answer_given_by_player,
            correct_answer: row
                .answer_given_by_player
                .map(|_| question.correct_answer),
            score: row.score,
            served_at: format_system_time(row.served_at),
        }
    }
}
