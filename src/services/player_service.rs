use std::time::SystemTime;

use rand::seq::IndexedRandom;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EmailPreferencesEntity, PlayerEntity},
    dto::player::{LeaderboardEntry, PlayerCard, PlayerResponse},
    error::ServiceError,
    services::identity::Identity,
    state::SharedState,
};

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 100;
const MIN_SEARCH_TERM: usize = 2;
const MAX_SEARCH_RESULTS: usize = 10;

/// Create the caller's player profile together with its email preferences.
pub async fn register_player(
    state: &SharedState,
    identity: &Identity,
    username: &str,
) -> Result<PlayerResponse, ServiceError> {
    let email = identity
        .email
        .clone()
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("identity has no email address".into()))?;
    let username = username.trim().to_string();
    let now = SystemTime::now();

    let config = state.config();
    let (profile_icon, profile_color) = state.with_rng(|rng| {
        (
            config.profile_icons.choose(rng).cloned().unwrap_or_default(),
            config.profile_colors.choose(rng).cloned().unwrap_or_default(),
        )
    });

    let player = state
        .datastore()
        .transact(|tx| {
            if tx.tables().player_by_user(&identity.subject).is_some() {
                return Err(ServiceError::InvalidState(
                    "player already registered".into(),
                ));
            }
            if tx.tables().player_by_username(&username).is_some() {
                return Err(ServiceError::InvalidState("username already taken".into()));
            }

            let player = PlayerEntity {
                id: Uuid::new_v4(),
                user_id: identity.subject.clone(),
                username: username.clone(),
                email: email.clone(),
                profile_icon,
                profile_color,
                last_active: now,
                games_played: 0,
                questions_attempted: 0,
                overall_score: 0,
            };
            tx.put(player.clone())?;
            tx.put(EmailPreferencesEntity {
                id: Uuid::new_v4(),
                player_id: player.id,
                daily_questions: true,
                weekly_reports: true,
                game_results: true,
                email,
            })?;
            Ok::<_, ServiceError>(player)
        })
        .await?;

    info!(player_id = %player.id, username = %player.username, "player registered");
    Ok(player.into())
}

/// Profile of the caller, if registered.
pub async fn current_player(
    state: &SharedState,
    identity: &Identity,
) -> Option<PlayerResponse> {
    state
        .datastore()
        .read(|tables| tables.player_by_user(&identity.subject).cloned())
        .await
        .map(PlayerResponse::from)
}

/// Refresh the caller's `last_active`; unregistered callers are ignored.
pub async fn touch_last_active(
    state: &SharedState,
    identity: &Identity,
) -> Result<(), ServiceError> {
    let now = SystemTime::now();
    state
        .datastore()
        .transact(|tx| {
            if let Some(mut player) = tx.tables().player_by_user(&identity.subject).cloned() {
                player.last_active = now;
                tx.put(player)?;
            }
            Ok::<_, ServiceError>(())
        })
        .await
}

/// Players by lifetime score, highest first.
pub async fn leaderboard(state: &SharedState, limit: Option<usize>) -> Vec<LeaderboardEntry> {
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);

    state
        .datastore()
        .read(|tables| {
            let mut players: Vec<&PlayerEntity> = tables.players.iter().collect();
            players.sort_by(|a, b| {
                b.overall_score
                    .cmp(&a.overall_score)
                    .then_with(|| a.username.cmp(&b.username))
            });

            players
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(index, player)| LeaderboardEntry {
                    rank: index + 1,
                    player_id: player.id,
                    username: player.username.clone(),
                    profile_icon: player.profile_icon.clone(),
                    profile_color: player.profile_color.clone(),
                    overall_score: player.overall_score,
                    games_played: player.games_played,
                })
                .collect()
        })
        .await
}

/// Players whose username contains `term`, ignoring case.
pub async fn search_players(state: &SharedState, term: &str) -> Vec<PlayerCard> {
    let term = term.trim().to_lowercase();
    if term.chars().count() < MIN_SEARCH_TERM {
        return Vec::new();
    }

    state
        .datastore()
        .read(|tables| {
            tables
                .players
                .iter()
                .filter(|player| player.username.to_lowercase().contains(&term))
                .take(MAX_SEARCH_RESULTS)
                .map(PlayerCard::from)
                .collect()
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{default_app, identity, register};

    #[tokio::test]
    async fn registration_creates_profile_and_preferences() {
        let app = default_app().await;
        let ada = identity("ada");

        let player = register_player(&app.state, &ada, "  ada  ").await.unwrap();

        assert_eq!(player.username, "ada");
        assert_eq!(player.email, "ada@example.com");
        assert!(app.state.config().profile_icons.contains(&player.profile_icon));
        let preferences = app
            .state
            .datastore()
            .read(|tables| tables.preferences_of(player.id).cloned())
            .await
            .unwrap();
        assert!(preferences.daily_questions && preferences.weekly_reports && preferences.game_results);
    }

    #[tokio::test]
    async fn one_profile_per_identity_and_username() {
        let app = default_app().await;
        register(&app.state, "ada").await;

        let again = register_player(&app.state, &identity("ada"), "other")
            .await
            .unwrap_err();
        assert!(matches!(again, ServiceError::InvalidState(_)));

        let taken = register_player(&app.state, &identity("grace"), "ADA")
            .await
            .unwrap_err();
        assert!(matches!(taken, ServiceError::InvalidState(message) if message == "username already taken"));
    }

    #[tokio::test]
    async fn registration_needs_an_email() {
        let app = default_app().await;
        let anonymous = Identity {
            subject: "auth|anon".into(),
            email: None,
        };
        let err = register_player(&app.state, &anonymous, "anon")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(current_player(&app.state, &anonymous).await.is_none());
    }

    #[tokio::test]
    async fn leaderboard_orders_by_score_then_name() {
        let app = default_app().await;
        for name in ["carol", "bob", "alice"] {
            register(&app.state, name).await;
        }
        app.state
            .datastore()
            .transact(|tx| {
                let mut bob = tx.tables().player_by_username("bob").cloned().unwrap();
                bob.overall_score = 15;
                tx.put(bob)
            })
            .await
            .unwrap();

        let board = leaderboard(&app.state, Some(2)).await;
        let names: Vec<_> = board.iter().map(|entry| entry.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
        assert_eq!(board[0].rank, 1);

        assert_eq!(leaderboard(&app.state, Some(0)).await.len(), 1);
    }

    #[tokio::test]
    async fn search_needs_two_characters() {
        let app = default_app().await;
        register(&app.state, "MathWiz").await;
        register(&app.state, "wizard").await;
        register(&app.state, "ada").await;

        assert!(search_players(&app.state, "w").await.is_empty());
        let found = search_players(&app.state, "WIZ").await;
        assert_eq!(found.len(), 2);
    }
}
