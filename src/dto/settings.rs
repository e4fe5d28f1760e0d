use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::EmailPreferencesEntity;

/// Notification opt-ins of the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailPreferencesResponse {
    pub daily_questions: bool,
    pub weekly_reports: bool,
    pub game_results: bool,
    pub email: String,
}

impl From<EmailPreferencesEntity> for EmailPreferencesResponse {
    fn from(preferences: EmailPreferencesEntity) -> Self {
        Self {
            daily_questions: preferences.daily_questions,
            weekly_reports: preferences.weekly_reports,
            game_results: preferences.game_results,
            email: preferences.email,
        }
    }
}

/// New opt-ins; every category must be given.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEmailPreferencesRequest {
    pub daily_questions: bool,
    pub weekly_reports: bool,
    pub game_results: bool,
}

/// Kind of feedback a player sends to the operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    #[default]
    General,
    /// Something is broken.
    Bug,
    /// Something is missing.
    Feature,
}

impl FeedbackCategory {
    /// Human label used in the operator email.
    pub fn label(self) -> &'static str {
        match self {
            FeedbackCategory::General => "General Feedback",
            FeedbackCategory::Bug => "Bug Report",
            FeedbackCategory::Feature => "Feature Request",
        }
    }
}

/// Free-text feedback; the sender is taken from the caller's profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitFeedbackRequest {
    /// Free text written by the player.
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[serde(default)]
    pub category: FeedbackCategory,
}
