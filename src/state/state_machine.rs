use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle phase of a single game, persisted alongside the game row.
///
/// `Waiting` is initial and `Finished` is terminal; there is no way back
/// into `Waiting` once a game has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GamePhase {
    /// Lobby is open; players may join with the invite code.
    Waiting,
    /// Questions are being served until the deadline passes.
    Active {
        /// When the host started the game.
        started_at: SystemTime,
        /// Server-side expiry of the round.
        deadline_at: SystemTime,
    },
    /// Scores are final.
    Finished {
        /// What ended the game.
        reason: FinishReason,
        /// When the game ended.
        finished_at: SystemTime,
    },
}

/// Coarse status exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Accepting players.
    Waiting,
    /// In progress.
    Active,
    /// Over.
    Finished,
}

/// Indicates why a game transitioned to finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The round deadline passed.
    Expired,
    /// Every active participant used up the question allowance.
    QuestionsExhausted,
    /// A client reported the end of its countdown.
    ClientReported,
}

/// Events that can be applied to a game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Host starts the game.
    Start {
        /// Start timestamp.
        at: SystemTime,
        /// Deadline computed from the configured round duration.
        deadline_at: SystemTime,
    },
    /// The game ends for the given reason.
    Finish {
        /// Why the game ends.
        reason: FinishReason,
        /// End timestamp.
        at: SystemTime,
    },
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the game was in when the event was received.
    pub from: GameStatus,
    /// The rejected event.
    pub event: GameEvent,
}

impl GamePhase {
    /// Coarse status of the phase.
    pub fn status(&self) -> GameStatus {
        match self {
            GamePhase::Waiting => GameStatus::Waiting,
            GamePhase::Active { .. } => GameStatus::Active,
            GamePhase::Finished { .. } => GameStatus::Finished,
        }
    }

    /// Deadline of an active game.
    pub fn deadline(&self) -> Option<SystemTime> {
        match self {
            GamePhase::Active { deadline_at, .. } => Some(*deadline_at),
            _ => None,
        }
    }

    /// True when the game is active but its deadline has passed at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self, GamePhase::Active { deadline_at, .. } if now >= *deadline_at)
    }

    /// True when the game is active and still within its deadline at `now`.
    pub fn is_playable(&self, now: SystemTime) -> bool {
        matches!(self, GamePhase::Active { .. }) && !self.is_expired(now)
    }

    /// Compute the phase reached by applying `event`, if the transition is legal.
    pub fn next(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::Waiting, GameEvent::Start { at, deadline_at }) => GamePhase::Active {
                started_at: at,
                deadline_at,
            },
            (GamePhase::Active { .. }, GameEvent::Finish { reason, at }) => GamePhase::Finished {
                reason,
                finished_at: at,
            },
            (from, event) => {
                return Err(InvalidTransition {
                    from: from.status(),
                    event,
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn start(now: SystemTime) -> GameEvent {
        GameEvent::Start {
            at: now,
            deadline_at: now + Duration::from_secs(30),
        }
    }

    fn finish(reason: FinishReason, now: SystemTime) -> GameEvent {
        GameEvent::Finish { reason, at: now }
    }

    #[test]
    fn full_happy_path_through_game() {
        let now = SystemTime::now();
        let phase = GamePhase::Waiting;

        let active = phase.next(start(now)).unwrap();
        assert_eq!(active.status(), GameStatus::Active);
        assert_eq!(active.deadline(), Some(now + Duration::from_secs(30)));

        let finished = active
            .next(finish(FinishReason::QuestionsExhausted, now))
            .unwrap();
        assert_eq!(
            finished,
            GamePhase::Finished {
                reason: FinishReason::QuestionsExhausted,
                finished_at: now,
            }
        );
    }

    #[test]
    fn start_is_rejected_outside_waiting() {
        let now = SystemTime::now();
        let active = GamePhase::Waiting.next(start(now)).unwrap();

        let err = active.next(start(now)).unwrap_err();
        assert_eq!(err.from, GameStatus::Active);

        let finished = active.next(finish(FinishReason::Expired, now)).unwrap();
        let err = finished.next(start(now)).unwrap_err();
        assert_eq!(err.from, GameStatus::Finished);
    }

    #[test]
    fn finished_is_terminal() {
        let now = SystemTime::now();
        let finished = GamePhase::Finished {
            reason: FinishReason::ClientReported,
            finished_at: now,
        };
        assert!(
            finished
                .next(finish(FinishReason::Expired, now))
                .is_err()
        );
    }

    #[test]
    fn waiting_cannot_finish_directly() {
        let err = GamePhase::Waiting
            .next(finish(FinishReason::ClientReported, SystemTime::now()))
            .unwrap_err();
        assert_eq!(err.from, GameStatus::Waiting);
    }

    #[test]
    fn expiry_only_applies_to_active_games() {
        let now = SystemTime::now();
        let active = GamePhase::Waiting.next(start(now)).unwrap();

        assert!(!active.is_expired(now));
        assert!(active.is_playable(now));
        assert!(active.is_expired(now + Duration::from_secs(30)));
        assert!(!active.is_playable(now + Duration::from_secs(31)));
        assert!(!GamePhase::Waiting.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn phase_serializes_with_status_tag() {
        let value = serde_json::to_value(GamePhase::Waiting).unwrap();
        assert_eq!(value["status"], "waiting");
    }
}
