use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dto::{format_system_time, settings::SubmitFeedbackRequest},
    error::ServiceError,
    services::{
        identity::{Identity, player_of},
        mailer::OutgoingEmail,
        templates::{self, FeedbackDetails},
    },
    state::SharedState,
};

/// Forward the caller's feedback to the operator mailbox.
///
/// Username and email are read from the caller's profile.
pub async fn submit_feedback(
    state: &SharedState,
    identity: &Identity,
    request: SubmitFeedbackRequest,
) -> Result<(), ServiceError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServiceError::InvalidInput(
            "feedback message is empty".into(),
        ));
    }

    let player = state
        .datastore()
        .read(|tables| player_of(tables, identity).cloned())
        .await?;

    let submitted_at = format_system_time(SystemTime::now());
    let html = templates::render_feedback(&FeedbackDetails {
        message,
        category: request.category.label(),
        username: &player.username,
        email: &player.email,
        submitted_at: &submitted_at,
    });
    let mail = &state.config().mail;

    if let Err(err) = state
        .mailer()
        .send(OutgoingEmail {
            from: mail.feedback_from.clone(),
            to: mail.feedback_to.clone(),
            subject: templates::feedback_subject(&player.username),
            html,
        })
        .await
    {
        warn!(player_id = %player.id, error = %err, "feedback dispatch failed");
        return Err(err.into());
    }

    info!(player_id = %player.id, category = ?request.category, "feedback forwarded");
    Ok(())
}
