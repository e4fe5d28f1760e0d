use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{EmailStatus, InvitationEntity},
    dto::{
        invitation::{SendInvitationsRequest, SendInvitationsResponse},
        webhook::EmailEventPayload,
    },
    error::ServiceError,
    services::{
        identity::{Identity, player_of},
        mailer::OutgoingEmail,
        templates::{self, InvitationDetails},
    },
    state::{SharedState, state_machine::GameStatus},
};

/// Email invitations for a waiting game, one address at a time.
///
/// Rows are written only after the provider accepted the email. The first
/// rejected address aborts the rest of the batch; earlier rows stay.
pub async fn send_game_invitations(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
    request: SendInvitationsRequest,
) -> Result<SendInvitationsResponse, ServiceError> {
    let (host, game) = state
        .datastore()
        .read(|tables| {
            let host = player_of(tables, identity)?.clone();
            let game = tables
                .games
                .get(&game_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;
            if game.host_id != host.id {
                return Err(ServiceError::PermissionDenied(
                    "only the host can invite players".into(),
                ));
            }
            if game.phase.status() != GameStatus::Waiting {
                return Err(ServiceError::InvalidState(
                    format!("game is {:?}", game.phase.status()).to_lowercase(),
                ));
            }
            Ok((host, game))
        })
        .await?;

    let invite_code = game
        .invite_code
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidState("game has no invite code".into()))?;
    let config = state.config();
    let html = templates::render_invitation(&InvitationDetails {
        host_username: &host.username,
        invite_code,
        max_questions: game.max_questions,
        difficulty: game.difficulty,
        topic: &game.topic,
        site_url: &config.site_url,
    });
    let subject = templates::invitation_subject();
    let mailer = state.mailer();

    let mut sent = 0;
    for email in request.emails {
        let email = email.trim().to_string();
        let message_id = match mailer
            .send(OutgoingEmail {
                from: config.mail.invite_from.clone(),
                to: email.clone(),
                subject: subject.clone(),
                html: html.clone(),
            })
            .await
        {
            Ok(message_id) => message_id,
            Err(err) => {
                warn!(%game_id, %email, sent, error = %err, "invitation dispatch failed; aborting batch");
                return Err(err.into());
            }
        };

        state
            .datastore()
            .transact(|tx| {
                tx.put(InvitationEntity {
                    id: Uuid::new_v4(),
                    game_id,
                    email: email.clone(),
                    email_status: EmailStatus::Sent,
                    game_join_status: false,
                    sent_at: SystemTime::now(),
                    sent_by: host.id,
                    message_id: message_id.clone(),
                })
            })
            .await?;
        sent += 1;
        info!(%game_id, %email, %message_id, "invitation sent");
    }

    Ok(SendInvitationsResponse { sent })
}

/// Apply a provider delivery event to the matching invitations.
///
/// Statuses only move forward; unknown event types and stale events change nothing.
/// Returns the number of updated invitations.
pub async fn handle_email_event(
    state: &SharedState,
    payload: EmailEventPayload,
) -> Result<usize, ServiceError> {
    let Some(status) = EmailStatus::from_event_type(&payload.event_type) else {
        debug!(event_type = %payload.event_type, "ignoring email event");
        return Ok(0);
    };
    let message_id = payload.data.email_id;
    let recipients: Vec<String> = payload
        .data
        .to
        .iter()
        .map(|recipient| recipient.trim().to_lowercase())
        .collect();

    let updated = state
        .datastore()
        .transact(|tx| {
            let advancing: Vec<InvitationEntity> = tx
                .tables()
                .invitations
                .iter()
                .filter(|invitation| {
                    invitation.message_id == message_id
                        && (recipients.is_empty()
                            || recipients.contains(&invitation.email.to_lowercase()))
                        && status.rank() > invitation.email_status.rank()
                })
                .cloned()
                .collect();

            let count = advancing.len();
            for mut invitation in advancing {
                invitation.email_status = status;
                tx.put(invitation)?;
            }
            Ok::<_, ServiceError>(count)
        })
        .await?;

    if updated > 0 {
        info!(%message_id, ?status, updated, "invitation delivery status updated");
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::webhook::EmailEventData,
        services::game_service::start_game,
        test_support::{create_game, default_app, register},
    };

    fn invite(emails: &[&str]) -> SendInvitationsRequest {
        SendInvitationsRequest {
            emails: emails.iter().map(|email| email.to_string()).collect(),
        }
    }

    fn event(event_type: &str, message_id: &str, to: &str) -> EmailEventPayload {
        EmailEventPayload {
            event_type: event_type.into(),
            data: EmailEventData {
                email_id: message_id.into(),
                to: vec![to.into()],
            },
        }
    }

    async fn status_of(state: &SharedState, email: &str) -> Option<EmailStatus> {
        state
            .datastore()
            .read(|tables| {
                tables
                    .invitations
                    .iter()
                    .find(|invitation| invitation.email == email)
                    .map(|invitation| invitation.email_status)
            })
            .await
    }

    #[tokio::test]
    async fn first_rejection_aborts_the_batch() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, code) = create_game(&app.state, &host, 5).await;
        app.mailer.fail_for("b@example.com");

        let err = send_game_invitations(
            &app.state,
            &host,
            game_id,
            invite(&["a@example.com", "b@example.com", "c@example.com"]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Dispatch(_)));
        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
        assert!(sent[0].html.contains(&code));
        let rows = app
            .state
            .datastore()
            .read(|tables| tables.invitations_of(game_id).count())
            .await;
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn only_the_host_of_a_waiting_game_invites() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;

        let err = send_game_invitations(&app.state, &guest, game_id, invite(&["x@example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        start_game(&app.state, &host, game_id).await.unwrap();
        let err = send_game_invitations(&app.state, &host, game_id, invite(&["x@example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_status_only_moves_forward() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;
        send_game_invitations(&app.state, &host, game_id, invite(&["grace@example.com"]))
            .await
            .unwrap();
        let message_id = "msg-1";

        let opened = handle_email_event(
            &app.state,
            event("email.opened", message_id, "Grace@Example.com"),
        )
        .await
        .unwrap();
        assert_eq!(opened, 1);

        let stale = handle_email_event(
            &app.state,
            event("email.delivered", message_id, "grace@example.com"),
        )
        .await
        .unwrap();
        let duplicate = handle_email_event(
            &app.state,
            event("email.opened", message_id, "grace@example.com"),
        )
        .await
        .unwrap();
        assert_eq!((stale, duplicate), (0, 0));
        assert_eq!(
            status_of(&app.state, "grace@example.com").await,
            Some(EmailStatus::Opened)
        );

        let unknown = handle_email_event(
            &app.state,
            event("email.scheduled", message_id, "grace@example.com"),
        )
        .await
        .unwrap();
        let other_message = handle_email_event(
            &app.state,
            event("email.clicked", "msg-404", "grace@example.com"),
        )
        .await
        .unwrap();
        assert_eq!((unknown, other_message), (0, 0));

        let bounced = handle_email_event(
            &app.state,
            event("email.bounced", message_id, "grace@example.com"),
        )
        .await
        .unwrap();
        assert_eq!(bounced, 1);
        assert_eq!(
            status_of(&app.state, "grace@example.com").await,
            Some(EmailStatus::Bounced)
        );
    }
}
