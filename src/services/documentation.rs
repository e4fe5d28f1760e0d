use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for MathRush Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::player::register_player,
        crate::routes::player::current_player,
        crate::routes::player::touch_activity,
        crate::routes::player::leaderboard,
        crate::routes::player::search_players,
        crate::routes::game::create_game,
        crate::routes::game::join_game,
        crate::routes::game::get_game,
        crate::routes::game::start_game,
        crate::routes::game::leave_game,
        crate::routes::game::report_game_over,
        crate::routes::game::game_results,
        crate::routes::game::participant_history,
        crate::routes::question::next_question,
        crate::routes::question::submit_answer,
        crate::routes::invitation::send_invitations,
        crate::routes::settings::get_email_preferences,
        crate::routes::settings::update_email_preferences,
        crate::routes::settings::submit_feedback,
        crate::routes::webhooks::email_event,
        crate::routes::sse::game_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageMode,
            crate::dto::player::RegisterPlayerRequest,
            crate::dto::player::PlayerResponse,
            crate::dto::player::LeaderboardEntry,
            crate::dto::player::PlayerCard,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::CreateGameResponse,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::JoinGameResponse,
            crate::dto::game::StartGameResponse,
            crate::dto::game::GameOverRequest,
            crate::dto::game::GameOverResponse,
            crate::dto::game::ParticipantView,
            crate::dto::game::GameView,
            crate::dto::game::GameResultEntry,
            crate::dto::game::HistoryEntry,
            crate::dto::question::QuestionView,
            crate::dto::question::NextQuestionResponse,
            crate::dto::question::AnswerRequest,
            crate::dto::question::AnswerOutcome,
            crate::dto::invitation::SendInvitationsRequest,
            crate::dto::invitation::SendInvitationsResponse,
            crate::dto::invitation::InvitationView,
            crate::dto::settings::EmailPreferencesResponse,
            crate::dto::settings::UpdateEmailPreferencesRequest,
            crate::dto::settings::SubmitFeedbackRequest,
            crate::dto::settings::FeedbackCategory,
            crate::dto::webhook::EmailEventPayload,
            crate::dto::webhook::EmailEventData,
            crate::dto::webhook::WebhookAck,
            crate::dto::sse::ParticipantJoinedEvent,
            crate::dto::sse::ParticipantLeftEvent,
            crate::dto::sse::GameStartedEvent,
            crate::dto::sse::ScoreUpdatedEvent,
            crate::dto::sse::GameFinishedEvent,
            crate::dao::models::Difficulty,
            crate::dao::models::ParticipantStatus,
            crate::dao::models::EmailStatus,
            crate::state::state_machine::GameStatus,
            crate::state::state_machine::FinishReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "players", description = "Player profiles and leaderboard"),
        (name = "games", description = "Game lifecycle"),
        (name = "questions", description = "Question serving and answer scoring"),
        (name = "invitations", description = "Email invitations to a waiting game"),
        (name = "settings", description = "Email notification preferences and feedback"),
        (name = "webhooks", description = "Email provider delivery callbacks"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
