use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod game;
pub mod health;
pub mod invitation;
pub mod player;
pub mod question;
pub mod settings;
pub mod sse;
pub mod validation;
pub mod webhook;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
