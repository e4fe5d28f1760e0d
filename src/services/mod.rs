/// OpenAPI documentation generation.
pub mod documentation;
/// Player feedback forwarded to the operators.
pub mod feedback_service;
/// Game lifecycle: creation, joining, start, leave and finish.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Caller identity and player lookup.
pub mod identity;
/// Email invitations and provider delivery events.
pub mod invitation_service;
/// Invite code generation and allocation.
pub mod invite_code;
/// Outgoing email providers.
pub mod mailer;
/// Post-game results, daily question and weekly digest emails.
pub mod notification_service;
/// Player profiles, leaderboard and search.
pub mod player_service;
/// Email notification preferences.
pub mod preferences_service;
/// Generated email content.
pub mod question_generator;
/// Question serving and answer scoring.
pub mod question_service;
/// Delayed and recurring background jobs.
pub mod scheduler;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscription service.
pub mod sse_service;
/// Persistent store health watch and write-behind journal.
pub mod storage_supervisor;
/// HTML email templates.
pub mod templates;
