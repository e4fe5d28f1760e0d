use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, validation::validate_username},
};

/// Payload used to create the caller's player profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterPlayerRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

/// Full profile of the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_icon: String,
    pub profile_color: String,
    pub last_active: String,
    pub games_played: u32,
    pub questions_attempted: u32,
    pub overall_score: i64,
}

impl From<PlayerEntity> for PlayerResponse {
    fn from(player: PlayerEntity) -> Self {
        Self {
            id: player.id,
            username: player.username,
            email: player.email,
            profile_icon: player.profile_icon,
            profile_color: player.profile_color,
            last_active: format_system_time(player.last_active),
            games_played: player.games_played,
            questions_attempted: player.questions_attempted,
            overall_score: player.overall_score,
        }
    }
}

/// Query string of the leaderboard route.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// Number of entries, 10 by default and at most 100.
    pub limit: Option<usize>,
}

/// One line of the global leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: Uuid,
    pub username: String,
    pub profile_icon: String,
    pub profile_color: String,
    pub overall_score: i64,
    pub games_played: u32,
}

/// Query string of the player search route.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Part of a username; at least two characters.
    pub q: String,
}

/// Public card of another player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerCard {
    pub id: Uuid,
    pub username: String,
    pub profile_icon: String,
    pub profile_color: String,
}

impl From<&PlayerEntity> for PlayerCard {
    fn from(player: &PlayerEntity) -> Self {
        Self {
            id: player.id,
            username: player.username.clone(),
            profile_icon: player.profile_icon.clone(),
            profile_color: player.profile_color.clone(),
        }
    }
}
