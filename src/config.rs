//! Application-level configuration loading: round rules, mail senders, avatars and job schedules.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MATHRUSH_BACK_CONFIG_PATH";
/// Environment variable holding the shared secret of the email webhook.
const WEBHOOK_TOKEN_ENV: &str = "WEBHOOK_TOKEN";

const DEFAULT_ICONS: &[&str] = &[
    "🐱", "🐶", "🐸", "🦊", "🐼", "🐨", "🦁", "🐯", "🐰", "🐹", "🐷", "🐮", "🐙", "🦄", "🌟", "⭐",
    "🎈", "🎨", "🎯", "🚀",
];
const DEFAULT_COLORS: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

/// Day of the week used by the weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleWeekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<ScheduleWeekday> for time::Weekday {
    fn from(value: ScheduleWeekday) -> Self {
        match value {
            ScheduleWeekday::Monday => time::Weekday::Monday,
            ScheduleWeekday::Tuesday => time::Weekday::Tuesday,
            ScheduleWeekday::Wednesday => time::Weekday::Wednesday,
            ScheduleWeekday::Thursday => time::Weekday::Thursday,
            ScheduleWeekday::Friday => time::Weekday::Friday,
            ScheduleWeekday::Saturday => time::Weekday::Saturday,
            ScheduleWeekday::Sunday => time::Weekday::Sunday,
        }
    }
}

/// UTC wall-clock time of a recurring job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScheduleAt {
    /// Restricts the job to one day of the week; every day when absent.
    #[serde(default)]
    pub weekday: Option<ScheduleWeekday>,
    pub hour: u8,
    pub minute: u8,
}

/// Sender addresses used for each email category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailSenders {
    pub invite_from: String,
    pub digest_from: String,
    pub results_from: String,
    pub feedback_from: String,
    /// Operator mailbox receiving player feedback.
    pub feedback_to: String,
}

impl Default for MailSenders {
    fn default() -> Self {
        Self {
            invite_from: "MathRush Game Invite <mail@mathrush.online>".into(),
            digest_from: "MathRush <mail@mathrush.online>".into(),
            results_from: "MathRush <mail@mathrush.online>".into(),
            feedback_from: "MathRush Feedback <mail@mathrush.online>".into(),
            feedback_to: "feedback@mathrush.online".into(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Length of a round, starting when the host starts the game.
    pub round_duration: Duration,
    /// Points won for a correct answer and lost for a wrong one.
    pub points_per_answer: i64,
    /// Attempts made to draw an unused invite code before giving up.
    pub invite_code_max_attempts: u32,
    /// Public URL of the web client, used in email links.
    pub site_url: String,
    pub mail: MailSenders,
    /// Avatar emojis handed out at registration.
    pub profile_icons: Vec<String>,
    /// Avatar colours handed out at registration.
    pub profile_colors: Vec<String>,
    pub daily_schedule: ScheduleAt,
    pub weekly_schedule: ScheduleAt,
    /// Insert the built-in question bank when the table is empty.
    pub seed_questions: bool,
    /// Shared secret expected in `x-webhook-token`; the webhook is open when unset.
    pub webhook_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        round_secs = app_config.round_duration.as_secs(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.webhook_token = env::var(WEBHOOK_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());
        if config.webhook_token.is_none() {
            warn!("{WEBHOOK_TOKEN_ENV} not set; email webhook accepts unsigned events");
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    round_duration_secs: Option<Duration>,
    points_per_answer: Option<i64>,
    invite_code_max_attempts: Option<u32>,
    site_url: Option<String>,
    mail: Option<MailSenders>,
    profile_icons: Option<Vec<String>>,
    profile_colors: Option<Vec<String>>,
    schedules: Option<RawSchedules>,
    seed_questions: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSchedules {
    daily: Option<ScheduleAt>,
    weekly: Option<ScheduleAt>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let schedules = value.schedules.unwrap_or_default();
        Self {
            round_duration: value.round_duration_secs.unwrap_or(Duration::from_secs(30)),
            points_per_answer: value.points_per_answer.unwrap_or(5),
            invite_code_max_attempts: value.invite_code_max_attempts.unwrap_or(16).max(1),
            site_url: value
                .site_url
                .unwrap_or_else(|| "https://mathrush.online".into()),
            mail: value.mail.unwrap_or_default(),
            profile_icons: non_empty_or(value.profile_icons, DEFAULT_ICONS),
            profile_colors: non_empty_or(value.profile_colors, DEFAULT_COLORS),
            daily_schedule: schedules.daily.unwrap_or(ScheduleAt {
                weekday: None,
                hour: 17,
                minute: 30,
            }),
            weekly_schedule: schedules.weekly.unwrap_or(ScheduleAt {
                weekday: Some(ScheduleWeekday::Tuesday),
                hour: 17,
                minute: 30,
            }),
            seed_questions: value.seed_questions.unwrap_or(true),
            webhook_token: None,
        }
    }
}

fn non_empty_or(values: Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match values {
        Some(values) if !values.is_empty() => values,
        _ => defaults.iter().map(|value| (*value).to_owned()).collect(),
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_rules() {
        let config = AppConfig::default();
        assert_eq!(config.round_duration, Duration::from_secs(30));
        assert_eq!(config.points_per_answer, 5);
        assert_eq!(config.profile_icons.len(), 20);
        assert_eq!(config.profile_colors.len(), 10);
        assert_eq!(
            config.weekly_schedule.weekday,
            Some(ScheduleWeekday::Tuesday)
        );
        assert!(config.daily_schedule.weekday.is_none());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "round_duration_secs": 45,
                "profile_icons": [],
                "mail": { "feedback_to": "ops@example.com" },
                "schedules": { "daily": { "hour": 8, "minute": 0 } }
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.round_duration, Duration::from_secs(45));
        assert_eq!(config.points_per_answer, 5);
        assert_eq!(config.profile_icons.len(), 20);
        assert_eq!(config.daily_schedule.hour, 8);
        assert_eq!(config.weekly_schedule.hour, 17);
        assert_eq!(config.mail.feedback_to, "ops@example.com");
        assert_eq!(config.mail.invite_from, MailSenders::default().invite_from);
    }
}
