use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::state_machine::GamePhase;

/// Difficulty tag shared by games and questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Warm-up questions.
    Easy,
    /// Multi-step questions.
    Medium,
    /// Larger numbers, more steps.
    Hard,
}

impl Difficulty {
    /// Lowercase label used in emails and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Player profile bound to exactly one authenticated identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Subject of the identity owning this profile.
    pub user_id: String,
    /// Unique public handle.
    pub username: String,
    /// Contact address copied from the identity at registration.
    pub email: String,
    /// Emoji used as avatar.
    pub profile_icon: String,
    /// Hex colour framing the avatar.
    pub profile_color: String,
    /// Last time the player interacted with the service.
    pub last_active: SystemTime,
    /// Number of games this player started as host.
    pub games_played: u32,
    /// Number of questions served to this player across all games.
    pub questions_attempted: u32,
    /// Lifetime score across all games.
    pub overall_score: i64,
}

/// Aggregate game row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Player who created the game and controls its start.
    pub host_id: Uuid,
    /// Question allowance per participant.
    pub max_questions: u32,
    /// Difficulty of the served questions.
    pub difficulty: Difficulty,
    /// Topic of the served questions.
    pub topic: String,
    /// Six character join code; cleared once the game finishes.
    pub invite_code: Option<String>,
    /// Lifecycle phase.
    pub phase: GamePhase,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Activity flag of a participant inside a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    /// Still playing.
    Active,
    /// Left the game; the row and its score are kept.
    Inactive,
}

/// Join row between a game and a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the participation.
    pub id: Uuid,
    /// Game joined.
    pub game_id: Uuid,
    /// Player who joined.
    pub player_id: Uuid,
    /// Score accumulated in this game.
    pub score: i64,
    /// Number of questions served so far in this game.
    pub current_question_count: u32,
    /// Activity flag.
    pub status: ParticipantStatus,
    /// When the player joined.
    pub joined_at: SystemTime,
}

/// Static multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// Prompt shown to the player.
    pub question: String,
    /// Exactly four answer options.
    pub options: Vec<String>,
    /// Index of the correct option, within `0..4`.
    pub correct_answer: u8,
    /// Difficulty tag.
    pub difficulty: Difficulty,
    /// Topic tag.
    pub topic: String,
    /// Worked solution revealed after answering.
    pub explanation: String,
}

/// One question served to one participant inside one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantQuestionEntity {
    /// Primary key of the served question.
    pub id: Uuid,
    /// Game the question was served in.
    pub game_id: Uuid,
    /// Player the question was served to.
    pub player_id: Uuid,
    /// Question served.
    pub question_id: Uuid,
    /// Option chosen by the player; `None` while unanswered.
    pub answer_given_by_player: Option<u8>,
    /// Score delta earned by the answer.
    pub score: i64,
    /// When the question was served.
    pub served_at: SystemTime,
    /// When the answer was recorded.
    pub answered_at: Option<SystemTime>,
}

impl ParticipantQuestionEntity {
    /// True until the player records an answer.
    pub fn is_unanswered(&self) -> bool {
        self.answer_given_by_player.is_none()
    }
}

/// Delivery status reported by the email provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    /// Accepted by the provider.
    Sent,
    /// Provider is retrying delivery.
    DeliveryDelayed,
    /// Reached the recipient server.
    Delivered,
    /// Opened by the recipient.
    Opened,
    /// A link was clicked.
    Clicked,
    /// Permanently rejected.
    Bounced,
    /// Marked as spam.
    Complained,
}

impl EmailStatus {
    /// Parse a provider event type such as `email.delivered`.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        let status = event_type.strip_prefix("email.").unwrap_or(event_type);
        match status {
            "sent" => Some(EmailStatus::Sent),
            "delivery_delayed" => Some(EmailStatus::DeliveryDelayed),
            "delivered" => Some(EmailStatus::Delivered),
            "opened" => Some(EmailStatus::Opened),
            "clicked" => Some(EmailStatus::Clicked),
            "bounced" => Some(EmailStatus::Bounced),
            "complained" => Some(EmailStatus::Complained),
            _ => None,
        }
    }

    /// Position in the delivery progression; statuses only move to a higher rank.
    pub fn rank(&self) -> u8 {
        match self {
            EmailStatus::Sent => 0,
            EmailStatus::DeliveryDelayed => 1,
            EmailStatus::Delivered => 2,
            EmailStatus::Opened => 3,
            EmailStatus::Clicked => 4,
            EmailStatus::Bounced | EmailStatus::Complained => 5,
        }
    }
}

/// Email invitation sent by a host to someone who has not joined yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitationEntity {
    /// Primary key of the invitation.
    pub id: Uuid,
    /// Game the invitation points to.
    pub game_id: Uuid,
    /// Recipient address.
    pub email: String,
    /// Latest delivery status.
    pub email_status: EmailStatus,
    /// Whether the recipient joined the game.
    pub game_join_status: bool,
    /// When the email was handed to the provider.
    pub sent_at: SystemTime,
    /// Host who sent the invitation.
    pub sent_by: Uuid,
    /// Provider message id used to match delivery events.
    pub message_id: String,
}

/// Notification opt-ins of a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailPreferencesEntity {
    /// Primary key of the preferences row.
    pub id: Uuid,
    /// Owning player.
    pub player_id: Uuid,
    /// Receive the daily challenge.
    pub daily_questions: bool,
    /// Receive the weekly digest.
    pub weekly_reports: bool,
    /// Receive the leaderboard after each game.
    pub game_results: bool,
    /// Destination address.
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_status_parses_provider_event_types() {
        assert_eq!(
            EmailStatus::from_event_type("email.delivered"),
            Some(EmailStatus::Delivered)
        );
        assert_eq!(
            EmailStatus::from_event_type("email.delivery_delayed"),
            Some(EmailStatus::DeliveryDelayed)
        );
        assert_eq!(EmailStatus::from_event_type("opened"), Some(EmailStatus::Opened));
        assert_eq!(EmailStatus::from_event_type("email.unknown"), None);
    }

    #[test]
    fn terminal_statuses_outrank_progress() {
        assert!(EmailStatus::Bounced.rank() > EmailStatus::Clicked.rank());
        assert!(EmailStatus::Delivered.rank() > EmailStatus::Sent.rank());
    }
}
