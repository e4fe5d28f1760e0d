use tracing::info;

use crate::{
    dao::models::EmailPreferencesEntity,
    dto::settings::{EmailPreferencesResponse, UpdateEmailPreferencesRequest},
    error::ServiceError,
    services::identity::{Identity, player_of},
    state::SharedState,
};

fn preferences_not_found() -> ServiceError {
    ServiceError::NotFound("email preferences not found".into())
}

/// Notification opt-ins of the caller.
pub async fn get_email_preferences(
    state: &SharedState,
    identity: &Identity,
) -> Result<EmailPreferencesResponse, ServiceError> {
    state
        .datastore()
        .read(|tables| {
            let player = player_of(tables, identity)?;
            tables
                .preferences_of(player.id)
                .cloned()
                .map(EmailPreferencesResponse::from)
                .ok_or_else(preferences_not_found)
        })
        .await
}

/// Replace the caller's notification opt-ins.
pub async fn update_email_preferences(
    state: &SharedState,
    identity: &Identity,
    request: UpdateEmailPreferencesRequest,
) -> Result<EmailPreferencesResponse, ServiceError> {
    let preferences = state
        .datastore()
        .transact(|tx| {
            let player_id = player_of(tx.tables(), identity)?.id;
            let current = tx
                .tables()
                .preferences_of(player_id)
                .cloned()
                .ok_or_else(preferences_not_found)?;
            let updated = EmailPreferencesEntity {
                daily_questions: request.daily_questions,
                weekly_reports: request.weekly_reports,
                game_results: request.game_results,
                ..current
            };
            tx.put(updated.clone())?;
            Ok::<_, ServiceError>(updated)
        })
        .await?;

    info!(player_id = %preferences.player_id, "email preferences updated");
    Ok(preferences.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{default_app, identity, register};

    #[tokio::test]
    async fn preferences_follow_the_caller() {
        let app = default_app().await;
        let ada = register(&app.state, "ada").await;

        let updated = update_email_preferences(
            &app.state,
            &ada,
            UpdateEmailPreferencesRequest {
                daily_questions: false,
                weekly_reports: true,
                game_results: false,
            },
        )
        .await
        .unwrap();
        assert!(!updated.daily_questions);

        let read = get_email_preferences(&app.state, &ada).await.unwrap();
        assert!(read.weekly_reports && !read.game_results);
        assert_eq!(read.email, "ada@example.com");

        let err = get_email_preferences(&app.state, &identity("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
