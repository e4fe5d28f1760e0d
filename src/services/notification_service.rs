//! Best-effort email fan-out: game results, daily question and weekly digest.
//!
//! Every job sends one email per recipient and keeps going when a send fails.

use time::{Date, Duration as TimeDuration, OffsetDateTime, macros::format_description};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        datastore::Tables,
        models::{Difficulty, EmailPreferencesEntity},
    },
    services::{
        mailer::OutgoingEmail,
        templates::{self, ResultLine},
    },
    state::SharedState,
};

const DAILY_TOPICS: &[&str] = &["algebra", "arithmetic", "geometry"];

struct Recipient {
    email: String,
    score: i64,
}

/// Email the final leaderboard to every participant who kept game results enabled.
/// Participants without a preferences row are skipped.
///
/// Returns the number of emails accepted by the provider.
pub async fn notify_game_finished(state: &SharedState, game_id: Uuid) -> usize {
    let (lines, recipients) = state
        .datastore()
        .read(|tables| {
            let mut standings: Vec<_> = tables
                .participants_of(game_id)
                .filter_map(|participant| {
                    tables
                        .players
                        .get(&participant.player_id)
                        .map(|player| (participant.score, player))
                })
                .collect();
            standings.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.username.cmp(&b.1.username)));

            let lines: Vec<(String, i64)> = standings
                .iter()
                .map(|(score, player)| (player.username.clone(), *score))
                .collect();
            let recipients: Vec<Recipient> = standings
                .iter()
                .filter_map(|(score, player)| {
                    let preferences = tables.preferences_of(player.id)?;
                    (preferences.game_results && !preferences.email.is_empty()).then(|| {
                        Recipient {
                            email: preferences.email.clone(),
                            score: *score,
                        }
                    })
                })
                .collect();
            (lines, recipients)
        })
        .await;

    if recipients.is_empty() {
        return 0;
    }

    let lines: Vec<ResultLine<'_>> = lines
        .iter()
        .map(|(username, score)| ResultLine {
            username,
            score: *score,
        })
        .collect();
    let html = templates::render_game_results(&lines);
    let from = &state.config().mail.results_from;

    let mut sent = 0;
    for recipient in recipients {
        let email = OutgoingEmail {
            from: from.clone(),
            to: recipient.email,
            subject: templates::results_subject(recipient.score),
            html: html.clone(),
        };
        if deliver(state, email, "game results").await {
            sent += 1;
        }
    }
    info!(%game_id, sent, "game results sent");
    sent
}

/// Email a freshly generated question to every daily-question subscriber.
pub async fn send_daily_question(state: &SharedState) -> usize {
    let subscribers = subscribers(state, |preferences| preferences.daily_questions).await;
    if subscribers.is_empty() {
        info!("no daily question subscribers");
        return 0;
    }

    let question = state
        .generator()
        .generate_question(Difficulty::Medium, DAILY_TOPICS)
        .await;
    let html = templates::render_daily_question(&question);
    let subject = templates::daily_subject(&short_date(OffsetDateTime::now_utc().date()));

    let sent = fan_out(state, subscribers, &subject, &html, "daily question").await;
    info!(sent, "daily question sent");
    sent
}

/// Email the weekly digest to every weekly-report subscriber.
pub async fn send_weekly_digest(state: &SharedState) -> usize {
    let subscribers = subscribers(state, |preferences| preferences.weekly_reports).await;
    if subscribers.is_empty() {
        info!("no weekly digest subscribers");
        return 0;
    }

    let generator = state.generator();
    let (news, concept) = tokio::join!(generator.top_news(), generator.math_concept());
    let today = OffsetDateTime::now_utc().date();
    let html = templates::render_weekly_digest(
        &week_label(today),
        &news,
        &concept,
        &state.config().site_url,
    );
    let subject = templates::weekly_subject(&short_date(today));

    let sent = fan_out(state, subscribers, &subject, &html, "weekly digest").await;
    info!(sent, "weekly digest sent");
    sent
}

async fn subscribers(
    state: &SharedState,
    wants: impl Fn(&EmailPreferencesEntity) -> bool,
) -> Vec<String> {
    state
        .datastore()
        .read(|tables: &Tables| {
            tables
                .email_preferences
                .iter()
                .filter(|preferences| wants(preferences) && !preferences.email.is_empty())
                .map(|preferences| preferences.email.clone())
                .collect()
        })
        .await
}

async fn fan_out(
    state: &SharedState,
    recipients: Vec<String>,
    subject: &str,
    html: &str,
    kind: &'static str,
) -> usize {
    let from = &state.config().mail.digest_from;
    let mut sent = 0;
    for to in recipients {
        let email = OutgoingEmail {
            from: from.clone(),
            to,
            subject: subject.to_string(),
            html: html.to_string(),
        };
        if deliver(state, email, kind).await {
            sent += 1;
        }
    }
    sent
}

async fn deliver(state: &SharedState, email: OutgoingEmail, kind: &'static str) -> bool {
    let to = email.to.clone();
    match state.mailer().send(email).await {
        Ok(_) => true,
        Err(err) => {
            warn!(%to, kind, error = %err, "email dispatch failed; skipping recipient");
            false
        }
    }
}

/// `Jan 5, 2026`
fn short_date(date: Date) -> String {
    date.format(format_description!(
        "[month repr:short] [day padding:none], [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}

/// `Week of January 4, 2026`, counted from the Sunday starting the week.
fn week_label(today: Date) -> String {
    let sunday = today - TimeDuration::days(i64::from(today.weekday().number_days_from_sunday()));
    let formatted = sunday
        .format(format_description!(
            "[month repr:long] [day padding:none], [year]"
        ))
        .unwrap_or_else(|_| sunday.to_string());
    format!("Week of {formatted}")
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::{
        dao::models::PlayerEntity,
        dto::settings::UpdateEmailPreferencesRequest,
        services::{game_service, preferences_service},
        state::state_machine::FinishReason,
        test_support::{create_game, default_app, identity, register},
    };

    #[test]
    fn dates_render_like_the_emails_expect() {
        assert_eq!(short_date(date!(2026 - 01 - 05)), "Jan 5, 2026");
        assert_eq!(week_label(date!(2026 - 01 - 07)), "Week of January 4, 2026");
        assert_eq!(week_label(date!(2026 - 01 - 04)), "Week of January 4, 2026");
    }

    #[tokio::test]
    async fn results_skip_players_who_opted_out() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, code) = create_game(&app.state, &host, 3).await;
        game_service::join_game_by_code(&app.state, &guest, &code)
            .await
            .unwrap();
        preferences_service::update_email_preferences(
            &app.state,
            &guest,
            UpdateEmailPreferencesRequest {
                daily_questions: true,
                weekly_reports: true,
                game_results: false,
            },
        )
        .await
        .unwrap();
        game_service::start_game(&app.state, &host, game_id)
            .await
            .unwrap();
        game_service::finish_game(&app.state, game_id, FinishReason::ClientReported)
            .await
            .unwrap();

        let sent = notify_game_finished(&app.state, game_id).await;

        assert_eq!(sent, 1);
        let emails: Vec<_> = app
            .mailer
            .sent()
            .into_iter()
            .filter(|email| email.subject.contains("Results"))
            .collect();
        assert!(emails.iter().all(|email| email.to == "ada@example.com"));
        assert!(emails[0].html.contains("grace"));
    }

    #[tokio::test]
    async fn results_skip_players_without_preferences() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, code) = create_game(&app.state, &host, 3).await;
        let linus = identity("linus");
        app.state
            .datastore()
            .transact(|tx| {
                tx.put(PlayerEntity {
                    id: Uuid::new_v4(),
                    user_id: linus.subject.clone(),
                    username: "linus".into(),
                    email: "linus@example.com".into(),
                    profile_icon: "🐧".into(),
                    profile_color: "#FF6B6B".into(),
                    last_active: std::time::SystemTime::now(),
                    games_played: 0,
                    questions_attempted: 0,
                    overall_score: 0,
                })
            })
            .await
            .unwrap();
        game_service::join_game_by_code(&app.state, &linus, &code)
            .await
            .unwrap();
        game_service::start_game(&app.state, &host, game_id)
            .await
            .unwrap();
        game_service::finish_game(&app.state, game_id, FinishReason::ClientReported)
            .await
            .unwrap();

        assert_eq!(notify_game_finished(&app.state, game_id).await, 1);
        assert!(
            app.mailer
                .sent()
                .iter()
                .all(|email| email.to != "linus@example.com")
        );
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_stop_the_digest() {
        let app = default_app().await;
        register(&app.state, "ada").await;
        register(&app.state, "grace").await;
        register(&app.state, "alan").await;
        app.mailer.fail_for("grace@example.com");

        let sent = send_weekly_digest(&app.state).await;

        assert_eq!(sent, 2);
        let recipients: Vec<_> = app.mailer.sent().into_iter().map(|email| email.to).collect();
        assert!(recipients.contains(&"ada@example.com".to_string()));
        assert!(recipients.contains(&"alan@example.com".to_string()));
    }

    #[tokio::test]
    async fn daily_question_reaches_subscribers_only() {
        let app = default_app().await;
        let ada = register(&app.state, "ada").await;
        register(&app.state, "grace").await;
        preferences_service::update_email_preferences(
            &app.state,
            &ada,
            UpdateEmailPreferencesRequest {
                daily_questions: false,
                weekly_reports: true,
                game_results: true,
            },
        )
        .await
        .unwrap();

        let sent = send_daily_question(&app.state).await;

        assert_eq!(sent, 1);
        let emails = app.mailer.sent();
        assert_eq!(emails[0].to, "grace@example.com");
        assert!(emails[0].subject.starts_with("🧮 Daily Math Challenge"));
    }
}
