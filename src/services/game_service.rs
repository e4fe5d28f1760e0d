use std::{
    collections::HashSet,
    time::{Duration, SystemTime},
};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        datastore::{Tables, Transaction},
        models::{GameEntity, ParticipantEntity, ParticipantStatus},
    },
    dto::{
        format_system_time,
        game::{
            CreateGameRequest, CreateGameResponse, GameOverResponse, GameResultEntry, GameView,
            HistoryEntry, JoinGameResponse, ParticipantView, StartGameResponse,
        },
        invitation::InvitationView,
    },
    error::ServiceError,
    services::{
        identity::{Identity, player_of},
        invite_code, notification_service, scheduler, sse_events,
    },
    state::{
        SharedState,
        state_machine::{FinishReason, GameEvent, GamePhase, GameStatus},
    },
};

fn game_not_found() -> ServiceError {
    ServiceError::NotFound("game not found".into())
}

/// Create a waiting game hosted by the caller, who joins it right away.
pub async fn create_game(
    state: &SharedState,
    identity: &Identity,
    request: CreateGameRequest,
) -> Result<CreateGameResponse, ServiceError> {
    let now = SystemTime::now();
    let max_attempts = state.config().invite_code_max_attempts;

    let (game_id, host_id, invite_code) = state
        .datastore()
        .transact(|tx| {
            let host_id = player_of(tx.tables(), identity)?.id;
            let game = GameEntity {
                id: Uuid::new_v4(),
                host_id,
                max_questions: request.max_questions,
                difficulty: request.difficulty,
                topic: request.topic.trim().to_string(),
                invite_code: None,
                phase: GamePhase::Waiting,
                created_at: now,
            };
            let game_id = game.id;
            let code = invite_code::assign_code(tx, game, max_attempts, || {
                state.with_rng(|rng| invite_code::generate_code(rng))
            })?;
            tx.put(new_participant(game_id, host_id, now))?;
            Ok::<_, ServiceError>((game_id, host_id, code))
        })
        .await?;

    info!(%game_id, %host_id, %invite_code, "game created");
    Ok(CreateGameResponse {
        game_id,
        invite_code,
    })
}

fn new_participant(game_id: Uuid, player_id: Uuid, now: SystemTime) -> ParticipantEntity {
    ParticipantEntity {
        id: Uuid::new_v4(),
        game_id,
        player_id,
        score: 0,
        current_question_count: 0,
        status: ParticipantStatus::Active,
        joined_at: now,
    }
}

/// Join a waiting game by invite code. Joining twice is harmless.
pub async fn join_game_by_code(
    state: &SharedState,
    identity: &Identity,
    code: &str,
) -> Result<JoinGameResponse, ServiceError> {
    let code = invite_code::normalize_code(code);
    let now = SystemTime::now();

    let (game_id, newcomer) = state
        .datastore()
        .transact(|tx| {
            let player = player_of(tx.tables(), identity)?.clone();
            let game_id = tx
                .tables()
                .game_by_invite_code(&code)
                .filter(|game| game.phase.status() == GameStatus::Waiting)
                .map(|game| game.id)
                .ok_or_else(|| {
                    ServiceError::NotFound("game not found or already started".into())
                })?;

            let joined = match tx.tables().participant(game_id, player.id).cloned() {
                Some(participant) if participant.status == ParticipantStatus::Active => false,
                Some(mut participant) => {
                    participant.status = ParticipantStatus::Active;
                    tx.put(participant)?;
                    true
                }
                None => {
                    tx.put(new_participant(game_id, player.id, now))?;
                    true
                }
            };

            let email = player.email.to_lowercase();
            let pending: Vec<_> = tx
                .tables()
                .invitations_of(game_id)
                .filter(|invitation| {
                    !invitation.game_join_status && invitation.email.to_lowercase() == email
                })
                .cloned()
                .collect();
            for mut invitation in pending {
                invitation.game_join_status = true;
                tx.put(invitation)?;
            }

            Ok::<_, ServiceError>((game_id, joined.then_some(player)))
        })
        .await?;

    if let Some(player) = newcomer {
        info!(%game_id, player_id = %player.id, "player joined game");
        sse_events::broadcast_participant_joined(state, game_id, &player);
    }

    Ok(JoinGameResponse { game_id })
}

/// Start a waiting game. Only its host may do so.
pub async fn start_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<StartGameResponse, ServiceError> {
    let round = state.config().round_duration;
    let now = SystemTime::now();
    let deadline_at = now + round;

    state
        .datastore()
        .transact(|tx| {
            let mut host = player_of(tx.tables(), identity)?.clone();
            let mut game = tx
                .get::<GameEntity>(game_id)
                .cloned()
                .ok_or_else(game_not_found)?;
            if game.host_id != host.id {
                return Err(ServiceError::PermissionDenied(
                    "only the host can start the game".into(),
                ));
            }

            game.phase = game.phase.next(GameEvent::Start {
                at: now,
                deadline_at,
            })?;
            tx.put(game)?;

            host.games_played += 1;
            host.last_active = now;
            tx.put(host)?;
            Ok(())
        })
        .await?;

    schedule_expiry(state, game_id, round);

    let deadline_at = format_system_time(deadline_at);
    info!(%game_id, %deadline_at, "game started");
    sse_events::broadcast_game_started(state, game_id, deadline_at.clone());

    Ok(StartGameResponse {
        game_id,
        deadline_at,
    })
}

/// Mark the caller as having left the game; the row and its score are kept.
pub async fn mark_participant_inactive(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<(), ServiceError> {
    settle_expiry(state, game_id).await?;
    let now = SystemTime::now();

    let (player_id, finished) = state
        .datastore()
        .transact(|tx| {
            let player_id = player_of(tx.tables(), identity)?.id;
            let mut participant = tx
                .tables()
                .participant(game_id, player_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
            participant.status = ParticipantStatus::Inactive;
            tx.put(participant)?;

            let finished = finish_if_exhausted(tx, game_id, now)?;
            Ok::<_, ServiceError>((player_id, finished))
        })
        .await?;

    info!(%game_id, %player_id, "player left game");
    sse_events::broadcast_participant_left(state, game_id, player_id);
    if finished {
        after_finish(state, game_id, FinishReason::QuestionsExhausted).await;
    }
    Ok(())
}

/// True once every active participant answered everything served and either used
/// its allowance or has no unseen question left in the pool.
/// A game nobody plays anymore is left to its deadline.
pub(crate) fn questions_exhausted(tables: &Tables, game: &GameEntity) -> bool {
    let mut active = tables
        .participants_of(game.id)
        .filter(|participant| participant.status == ParticipantStatus::Active)
        .peekable();
    if active.peek().is_none() {
        return false;
    }

    active.all(|participant| participant_done(tables, game, participant))
}

fn participant_done(tables: &Tables, game: &GameEntity, participant: &ParticipantEntity) -> bool {
    let mut seen = HashSet::new();
    for row in tables.served_questions_of(game.id, participant.player_id) {
        if row.is_unanswered() {
            return false;
        }
        seen.insert(row.question_id);
    }

    participant.current_question_count >= game.max_questions
        || tables
            .questions_matching(&game.topic, game.difficulty)
            .all(|question| seen.contains(&question.id))
}

/// Finish a playable game whose participants are all done.
pub(crate) fn finish_if_exhausted(
    tx: &mut Transaction<'_>,
    game_id: Uuid,
    now: SystemTime,
) -> Result<bool, ServiceError> {
    let exhausted = tx.get::<GameEntity>(game_id).is_some_and(|game| {
        game.phase.is_playable(now) && questions_exhausted(tx.tables(), game)
    });
    if !exhausted {
        return Ok(false);
    }
    finish_in(tx, game_id, FinishReason::QuestionsExhausted, now)
}

/// Move an active game to finished inside a transaction and release its invite code.
///
/// Returns `false` when the game was already finished.
pub(crate) fn finish_in(
    tx: &mut Transaction<'_>,
    game_id: Uuid,
    reason: FinishReason,
    now: SystemTime,
) -> Result<bool, ServiceError> {
    let mut game = tx
        .get::<GameEntity>(game_id)
        .cloned()
        .ok_or_else(game_not_found)?;
    if game.phase.status() == GameStatus::Finished {
        return Ok(false);
    }

    game.phase = game.phase.next(GameEvent::Finish { reason, at: now })?;
    game.invite_code = None;
    tx.put(game)?;
    Ok(true)
}

/// Finish an active game. Only the call that performs the transition returns `true`
/// and triggers the post-game notifications.
pub async fn finish_game(
    state: &SharedState,
    game_id: Uuid,
    reason: FinishReason,
) -> Result<bool, ServiceError> {
    let now = SystemTime::now();
    let finished = state
        .datastore()
        .transact(|tx| finish_in(tx, game_id, reason, now))
        .await?;

    if finished {
        after_finish(state, game_id, reason).await;
    }
    Ok(finished)
}

/// Announce a finished game, close its channel and spawn the result emails.
pub(crate) async fn after_finish(state: &SharedState, game_id: Uuid, reason: FinishReason) {
    info!(%game_id, ?reason, "game finished");

    match game_results(state, game_id).await {
        Ok(results) => sse_events::broadcast_game_finished(state, game_id, reason, results),
        Err(err) => warn!(%game_id, error = %err, "could not build final scoreboard"),
    }
    state.game_channels().close(game_id);

    let notifier_state = state.clone();
    tokio::spawn(async move {
        notification_service::notify_game_finished(&notifier_state, game_id).await;
    });
}

/// Finish the game first if its deadline already passed.
pub(crate) async fn settle_expiry(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let now = SystemTime::now();
    let expired = state
        .datastore()
        .read(|tables| {
            tables
                .games
                .get(&game_id)
                .is_some_and(|game| game.phase.is_expired(now))
        })
        .await;

    if expired {
        finish_game(state, game_id, FinishReason::Expired).await?;
    }
    Ok(())
}

fn schedule_expiry(state: &SharedState, game_id: Uuid, delay: Duration) {
    let expiry_state = state.clone();
    scheduler::run_after(delay, async move {
        if let Err(err) = finish_game(&expiry_state, game_id, FinishReason::Expired).await {
            warn!(%game_id, error = %err, "scheduled expiry failed");
        }
    });
}

/// Re-arm deadline expiry of the active games loaded from storage.
///
/// Games whose deadline passed while the server was down finish right away.
/// Returns the number of games finished that way.
pub async fn resume_expiry(state: &SharedState) -> usize {
    let now = SystemTime::now();
    let deadlines: Vec<(Uuid, SystemTime)> = state
        .datastore()
        .read(|tables| {
            tables
                .games
                .iter()
                .filter_map(|game| game.phase.deadline().map(|deadline| (game.id, deadline)))
                .collect()
        })
        .await;

    let mut finished = 0;
    for (game_id, deadline) in deadlines {
        match deadline.duration_since(now) {
            Ok(remaining) if !remaining.is_zero() => schedule_expiry(state, game_id, remaining),
            _ => match finish_game(state, game_id, FinishReason::Expired).await {
                Ok(true) => finished += 1,
                Ok(false) => {}
                Err(err) => warn!(%game_id, error = %err, "could not expire restored game"),
            },
        }
    }
    if finished > 0 {
        info!(finished, "expired games restored past their deadline");
    }
    finished
}

/// Client report that its countdown ran out (or will in `time_left_secs`).
///
/// The finish is never scheduled past the server deadline.
pub async fn report_game_over(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
    time_left_secs: i64,
) -> Result<GameOverResponse, ServiceError> {
    settle_expiry(state, game_id).await?;
    let now = SystemTime::now();

    let phase = state
        .datastore()
        .read(|tables| {
            let player = player_of(tables, identity)?;
            let game = tables.games.get(&game_id).ok_or_else(game_not_found)?;
            if tables.participant(game_id, player.id).is_none() {
                return Err(ServiceError::PermissionDenied(
                    "not a participant of this game".into(),
                ));
            }
            Ok(game.phase.clone())
        })
        .await?;

    let remaining = match phase {
        GamePhase::Waiting => {
            return Err(ServiceError::InvalidState("game is waiting".into()));
        }
        GamePhase::Finished { .. } => {
            return Ok(GameOverResponse {
                finished: false,
                finishes_in_secs: None,
            });
        }
        GamePhase::Active { deadline_at, .. } => {
            deadline_at.duration_since(now).unwrap_or_default()
        }
    };

    let requested = Duration::from_secs(u64::try_from(time_left_secs).unwrap_or(0));
    let delay = requested.min(remaining);
    if delay.is_zero() {
        let finished = finish_game(state, game_id, FinishReason::ClientReported).await?;
        return Ok(GameOverResponse {
            finished,
            finishes_in_secs: None,
        });
    }

    let finish_state = state.clone();
    scheduler::run_after(delay, async move {
        if let Err(err) = finish_game(&finish_state, game_id, FinishReason::ClientReported).await
        {
            warn!(%game_id, error = %err, "reported game over failed");
        }
    });
    info!(%game_id, delay_secs = delay.as_secs(), "game over reported; finish scheduled");

    Ok(GameOverResponse {
        finished: false,
        finishes_in_secs: Some(delay.as_secs()),
    })
}

/// Game as seen by one of its participants.
pub async fn get_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<GameView, ServiceError> {
    settle_expiry(state, game_id).await?;

    state
        .datastore()
        .read(|tables| {
            let viewer = player_of(tables, identity)?;
            let game = tables.games.get(&game_id).ok_or_else(game_not_found)?;
            if tables.participant(game_id, viewer.id).is_none() {
                return Err(ServiceError::PermissionDenied(
                    "not a participant of this game".into(),
                ));
            }

            let mut view = GameView::new(game, viewer.id);
            view.participants = tables
                .participants_of(game_id)
                .filter(|participant| participant.status == ParticipantStatus::Active)
                .filter_map(|participant| {
                    tables
                        .players
                        .get(&participant.player_id)
                        .map(|player| ParticipantView::from((participant, player)))
                })
                .collect();

            if view.is_host {
                view.pending_invitations = Some(
                    tables
                        .invitations_of(game_id)
                        .filter(|invitation| !invitation.game_join_status)
                        .map(InvitationView::from)
                        .collect(),
                );
            }
            Ok(view)
        })
        .await
}

/// Questions served to the caller in a game, in serving order.
pub async fn participant_history(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<Vec<HistoryEntry>, ServiceError> {
    state
        .datastore()
        .read(|tables| {
            let player = player_of(tables, identity)?;
            if tables.participant(game_id, player.id).is_none() {
                return Err(ServiceError::NotFound("participant not found".into()));
            }

            Ok(tables
                .served_questions_of(game_id, player.id)
                .filter_map(|row| {
                    tables
                        .questions
                        .get(&row.question_id)
                        .map(|question| HistoryEntry::new(row, question))
                })
                .collect())
        })
        .await
}

/// Scoreboard of a game: every participant by score, highest first.
pub async fn game_results(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Vec<GameResultEntry>, ServiceError> {
    state
        .datastore()
        .read(|tables| {
            if tables.games.get(&game_id).is_none() {
                return Err(game_not_found());
            }

            let mut rows: Vec<_> = tables
                .participants_of(game_id)
                .filter_map(|participant| {
                    tables
                        .players
                        .get(&participant.player_id)
                        .map(|player| (participant.score, player))
                })
                .collect();
            rows.sort_by(|a, b| b.0.cmp(&a.0));

            Ok(rows
                .into_iter()
                .enumerate()
                .map(|(index, (score, player))| GameResultEntry {
                    rank: index + 1,
                    player_id: player.id,
                    username: player.username.clone(),
                    profile_icon: player.profile_icon.clone(),
                    profile_color: player.profile_color.clone(),
                    score,
                })
                .collect())
        })
        .await
}
