//! Deferred and recurring background jobs on the tokio runtime.

use std::{future::Future, time::Duration};

use time::{OffsetDateTime, Time};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info};

use crate::config::ScheduleAt;

/// Run `job` once after `delay`.
pub fn run_after<F>(delay: Duration, job: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        sleep(delay).await;
        job.await;
    })
}

/// First instant strictly after `now` matching the schedule, in UTC.
pub fn next_occurrence(now: OffsetDateTime, at: ScheduleAt) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    let wall_clock = Time::from_hms(at.hour.min(23), at.minute.min(59), 0).unwrap_or(Time::MIDNIGHT);
    let mut candidate = now.date().with_time(wall_clock).assume_utc();

    // A weekly schedule matches within seven days of today.
    for _ in 0..8 {
        let weekday_matches = at
            .weekday
            .is_none_or(|weekday| candidate.weekday() == time::Weekday::from(weekday));
        if candidate > now && weekday_matches {
            break;
        }
        candidate += time::Duration::days(1);
    }
    candidate
}

/// Run `job` every time the schedule comes around, forever.
pub fn spawn_recurring<F, Fut>(name: &'static str, at: ScheduleAt, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            let now = OffsetDateTime::now_utc();
            let next = next_occurrence(now, at);
            let wait = Duration::try_from(next - now).unwrap_or_default();
            info!(job = name, next = %next, "scheduled recurring job");
            sleep(wait).await;

            debug!(job = name, "running recurring job");
            job().await;
        }
    })
}
