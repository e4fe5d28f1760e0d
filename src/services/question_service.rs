use std::{collections::HashSet, time::SystemTime};

use rand::seq::IndexedRandom;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        datastore::Transaction,
        models::{
            GameEntity, ParticipantEntity, ParticipantQuestionEntity, ParticipantStatus,
            QuestionEntity,
        },
    },
    dto::question::{AnswerOutcome, AnswerRequest, NextQuestionResponse, QuestionView},
    error::ServiceError,
    services::{
        game_service,
        identity::{Identity, player_of},
        sse_events,
    },
    state::{SharedState, state_machine::FinishReason},
};

/// Game and participation of the caller, checked for play.
fn playing_participant(
    tx: &Transaction<'_>,
    game_id: Uuid,
    player_id: Uuid,
    now: SystemTime,
) -> Result<(GameEntity, ParticipantEntity), ServiceError> {
    let game = tx
        .get::<GameEntity>(game_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;
    if !game.phase.is_playable(now) {
        return Err(ServiceError::InvalidState(
            format!("game is {:?}", game.phase.status()).to_lowercase(),
        ));
    }

    let participant = tx
        .tables()
        .participant(game_id, player_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound("participant not found".into()))?;
    if participant.status == ParticipantStatus::Inactive {
        return Err(ServiceError::InvalidState(
            "participant has left the game".into(),
        ));
    }

    Ok((game, participant))
}

/// Serve the caller's next question.
///
/// An outstanding unanswered question is served again without consuming a slot.
/// Returns `None` when the pool holds nothing the caller has not seen yet, which
/// finishes the game once every other participant is done too.
pub async fn get_next_question(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<NextQuestionResponse, ServiceError> {
    game_service::settle_expiry(state, game_id).await?;
    let now = SystemTime::now();

    let (question, game_finished) = state
        .datastore()
        .transact(|tx| {
            let mut player = player_of(tx.tables(), identity)?.clone();
            let (game, mut participant) = playing_participant(tx, game_id, player.id, now)?;

            let outstanding = tx
                .tables()
                .served_questions_of(game_id, player.id)
                .find(|row| row.is_unanswered())
                .and_then(|row| tx.get::<QuestionEntity>(row.question_id));
            if let Some(question) = outstanding {
                let view = QuestionView::new(
                    question,
                    participant.current_question_count,
                    game.max_questions,
                );
                return Ok((Some(view), false));
            }

            if participant.current_question_count >= game.max_questions {
                return Err(ServiceError::InvalidState(
                    "question allowance used up".into(),
                ));
            }

            let served: HashSet<Uuid> = tx
                .tables()
                .served_questions_of(game_id, player.id)
                .map(|row| row.question_id)
                .collect();
            let pool: Vec<&QuestionEntity> = tx
                .tables()
                .questions_matching(&game.topic, game.difficulty)
                .filter(|question| !served.contains(&question.id))
                .collect();
            let Some(question) = state.with_rng(|rng| pool.choose(rng).map(|q| (*q).clone()))
            else {
                let finished = game_service::finish_if_exhausted(tx, game_id, now)?;
                return Ok((None, finished));
            };

            tx.put(ParticipantQuestionEntity {
                id: Uuid::new_v4(),
                game_id,
                player_id: player.id,
                question_id: question.id,
                answer_given_by_player: None,
                score: 0,
                served_at: now,
                answered_at: None,
            })?;

            participant.current_question_count += 1;
            let number = participant.current_question_count;
            tx.put(participant)?;

            player.questions_attempted += 1;
            player.last_active = now;
            tx.put(player)?;

            let view = QuestionView::new(&question, number, game.max_questions);
            Ok::<_, ServiceError>((Some(view), false))
        })
        .await?;

    match &question {
        Some(view) => debug!(
            %game_id,
            question_id = %view.question_id,
            number = view.number,
            "question served"
        ),
        None => info!(%game_id, "question pool exhausted for participant"),
    }
    if game_finished {
        game_service::after_finish(state, game_id, FinishReason::QuestionsExhausted).await;
    }
    Ok(NextQuestionResponse { question })
}

/// Record the caller's answer to a served question and apply the score everywhere at once.
///
/// Correctness is decided here from the stored question. A question can be answered once.
pub async fn update_answer(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
    request: AnswerRequest,
) -> Result<AnswerOutcome, ServiceError> {
    game_service::settle_expiry(state, game_id).await?;
    let now = SystemTime::now();
    let points = state.config().points_per_answer;

    let (outcome, player_id, questions_served) = state
        .datastore()
        .transact(|tx| {
            let mut player = player_of(tx.tables(), identity)?.clone();
            let mut row = tx
                .tables()
                .served_question(game_id, request.question_id, player.id)
                .filter(|row| row.is_unanswered())
                .cloned()
                .ok_or_else(|| {
                    ServiceError::NotFound("game player question not found".into())
                })?;
            let (_, mut participant) = playing_participant(tx, game_id, player.id, now)?;
            let question = tx
                .get::<QuestionEntity>(request.question_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound("question not found".into()))?;

            let correct = request.answer_index == question.correct_answer;
            let delta = if correct { points } else { -points };

            row.answer_given_by_player = Some(request.answer_index);
            row.score = delta;
            row.answered_at = Some(now);
            tx.put(row)?;

            participant.score += delta;
            let game_score = participant.score;
            let questions_served = participant.current_question_count;
            tx.put(participant)?;

            player.overall_score += delta;
            player.last_active = now;
            let overall_score = player.overall_score;
            let player_id = player.id;
            tx.put(player)?;

            let game_finished = game_service::finish_if_exhausted(tx, game_id, now)?;

            let outcome = AnswerOutcome {
                correct,
                correct_answer: question.correct_answer,
                explanation: question.explanation,
                score_delta: delta,
                game_score,
                overall_score,
                game_finished,
            };
            Ok::<_, ServiceError>((outcome, player_id, questions_served))
        })
        .await?;

    info!(
        %game_id,
        %player_id,
        question_id = %request.question_id,
        correct = outcome.correct,
        delta = outcome.score_delta,
        "answer recorded"
    );
    sse_events::broadcast_score_updated(
        state,
        game_id,
        player_id,
        outcome.game_score,
        questions_served,
    );
    if outcome.game_finished {
        game_service::after_finish(state, game_id, FinishReason::QuestionsExhausted).await;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::Difficulty,
        dto::game::CreateGameRequest,
        services::game_service::{get_game, join_game_by_code, start_game},
        state::state_machine::GameStatus,
        test_support::{correct_answer, create_game, default_app, register},
    };

    async fn next(state: &SharedState, who: &Identity, game_id: Uuid) -> QuestionView {
        get_next_question(state, who, game_id)
            .await
            .unwrap()
            .question
            .unwrap()
    }

    async fn scores(state: &SharedState, who: &Identity, game_id: Uuid) -> (i64, i64) {
        state
            .datastore()
            .read(|tables| {
                let player = tables.player_by_user(&who.subject).unwrap();
                let participant = tables.participant(game_id, player.id).unwrap();
                (player.overall_score, participant.score)
            })
            .await
    }

    #[tokio::test]
    async fn questions_need_an_active_game() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;

        let err = get_next_question(&app.state, &host, game_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn outstanding_question_is_served_again() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;
        start_game(&app.state, &host, game_id).await.unwrap();

        let first = next(&app.state, &host, game_id).await;
        let again = next(&app.state, &host, game_id).await;

        assert_eq!(first.question_id, again.question_id);
        assert_eq!(first.options.len(), 4);
        assert_eq!(again.number, 1);
        let attempted = app
            .state
            .datastore()
            .read(|tables| {
                tables
                    .player_by_user(&host.subject)
                    .map(|p| p.questions_attempted)
            })
            .await;
        assert_eq!(attempted, Some(1));
    }

    #[tokio::test]
    async fn answers_score_all_rows_together() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;
        start_game(&app.state, &host, game_id).await.unwrap();

        let question = next(&app.state, &host, game_id).await;
        let right = correct_answer(&app.state, question.question_id).await;
        let outcome = update_answer(
            &app.state,
            &host,
            game_id,
            AnswerRequest {
                question_id: question.question_id,
                answer_index: right,
            },
        )
        .await
        .unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.score_delta, 5);
        assert_eq!(scores(&app.state, &host, game_id).await, (5, 5));

        let question = next(&app.state, &host, game_id).await;
        let right = correct_answer(&app.state, question.question_id).await;
        let outcome = update_answer(
            &app.state,
            &host,
            game_id,
            AnswerRequest {
                question_id: question.question_id,
                answer_index: (right + 1) % 4,
            },
        )
        .await
        .unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_answer, right);
        assert_eq!(outcome.score_delta, -5);
        assert_eq!(scores(&app.state, &host, game_id).await, (0, 0));

        let row_score = app
            .state
            .datastore()
            .read(|tables| {
                let player = tables.player_by_user(&host.subject).unwrap();
                tables
                    .served_question(game_id, question.question_id, player.id)
                    .map(|row| (row.score, row.answer_given_by_player))
            })
            .await;
        assert_eq!(row_score, Some((-5, Some((right + 1) % 4))));
    }

    #[tokio::test]
    async fn second_answer_is_rejected_without_side_effects() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;
        start_game(&app.state, &host, game_id).await.unwrap();

        let question = next(&app.state, &host, game_id).await;
        let request = |answer_index| AnswerRequest {
            question_id: question.question_id,
            answer_index,
        };
        update_answer(&app.state, &host, game_id, request(0))
            .await
            .unwrap();
        let before = scores(&app.state, &host, game_id).await;

        let err = update_answer(&app.state, &host, game_id, request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(message) if message == "game player question not found"));
        assert_eq!(scores(&app.state, &host, game_id).await, before);
    }

    #[tokio::test]
    async fn concurrent_answers_to_one_question_apply_once() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 5).await;
        start_game(&app.state, &host, game_id).await.unwrap();
        let question_id = next(&app.state, &host, game_id).await.question_id;
        let right = correct_answer(&app.state, question_id).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = app.state.clone();
                let host = host.clone();
                tokio::spawn(async move {
                    update_answer(
                        &state,
                        &host,
                        game_id,
                        AnswerRequest {
                            question_id,
                            answer_index: right,
                        },
                    )
                    .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(err) => assert!(matches!(err, ServiceError::NotFound(_))),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(scores(&app.state, &host, game_id).await, (5, 5));
    }

    #[tokio::test]
    async fn allowance_caps_served_questions() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, code) = create_game(&app.state, &host, 1).await;
        join_game_by_code(&app.state, &guest, &code).await.unwrap();
        start_game(&app.state, &host, game_id).await.unwrap();

        let question = next(&app.state, &host, game_id).await;
        update_answer(
            &app.state,
            &host,
            game_id,
            AnswerRequest {
                question_id: question.question_id,
                answer_index: 0,
            },
        )
        .await
        .unwrap();

        let err = get_next_question(&app.state, &host, game_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn last_answer_of_everyone_finishes_the_game() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, code) = create_game(&app.state, &host, 2).await;
        join_game_by_code(&app.state, &guest, &code).await.unwrap();
        start_game(&app.state, &host, game_id).await.unwrap();

        let mut finished_by = Vec::new();
        for player in [&host, &guest] {
            for _ in 0..2 {
                let question = next(&app.state, player, game_id).await;
                let outcome = update_answer(
                    &app.state,
                    player,
                    game_id,
                    AnswerRequest {
                        question_id: question.question_id,
                        answer_index: 0,
                    },
                )
                .await
                .unwrap();
                finished_by.push(outcome.game_finished);
            }
        }

        assert_eq!(finished_by, vec![false, false, false, true]);
        let view = get_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(view.status, GameStatus::Finished);
        assert_eq!(view.finish_reason, Some(FinishReason::QuestionsExhausted));
        assert!(view.invite_code.is_none());
    }

    #[tokio::test]
    async fn leaving_player_no_longer_blocks_exhaustion() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, code) = create_game(&app.state, &host, 1).await;
        join_game_by_code(&app.state, &guest, &code).await.unwrap();
        start_game(&app.state, &host, game_id).await.unwrap();

        let question = next(&app.state, &host, game_id).await;
        let outcome = update_answer(
            &app.state,
            &host,
            game_id,
            AnswerRequest {
                question_id: question.question_id,
                answer_index: 0,
            },
        )
        .await
        .unwrap();
        assert!(!outcome.game_finished);

        game_service::mark_participant_inactive(&app.state, &guest, game_id)
            .await
            .unwrap();
        let view = get_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(view.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn running_out_of_questions_finishes_the_game() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let (game_id, _) = create_game(&app.state, &host, 10).await;
        start_game(&app.state, &host, game_id).await.unwrap();
        let pool = app
            .state
            .datastore()
            .read(|tables| tables.questions_matching("addition", Difficulty::Easy).count())
            .await;
        assert!(pool < 10);

        let mut served = 0;
        let mut finished = false;
        while !finished {
            let question = next(&app.state, &host, game_id).await;
            served += 1;
            finished = update_answer(
                &app.state,
                &host,
                game_id,
                AnswerRequest {
                    question_id: question.question_id,
                    answer_index: 0,
                },
            )
            .await
            .unwrap()
            .game_finished;
        }

        assert_eq!(served, pool);
        let view = get_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(view.status, GameStatus::Finished);
        assert_eq!(view.finish_reason, Some(FinishReason::QuestionsExhausted));
    }

    #[tokio::test]
    async fn empty_pool_finishes_on_first_request() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let game_id = game_service::create_game(
            &app.state,
            &host,
            CreateGameRequest {
                max_questions: 3,
                difficulty: Difficulty::Hard,
                topic: "calculus".into(),
            },
        )
        .await
        .unwrap()
        .game_id;
        start_game(&app.state, &host, game_id).await.unwrap();

        let response = get_next_question(&app.state, &host, game_id).await.unwrap();
        assert!(response.question.is_none());
        let view = get_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(view.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn full_round_trip() {
        let app = default_app().await;
        let host = register(&app.state, "ada").await;
        let guest = register(&app.state, "grace").await;
        let (game_id, code) = create_game(&app.state, &host, 5).await;
        assert_eq!(code.len(), 6);
        join_game_by_code(&app.state, &guest, &code).await.unwrap();
        start_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(
            get_game(&app.state, &guest, game_id).await.unwrap().status,
            GameStatus::Active
        );

        for player in [&host, &guest] {
            let mut seen = HashSet::new();
            for round in 0..5 {
                let question = next(&app.state, player, game_id).await;
                assert_eq!(question.options.len(), 4);
                assert!(seen.insert(question.question_id), "question served twice");
                let request = AnswerRequest {
                    question_id: question.question_id,
                    answer_index: 1,
                };
                update_answer(&app.state, player, game_id, request)
                    .await
                    .unwrap();

                if round == 0 {
                    let replay = update_answer(
                        &app.state,
                        player,
                        game_id,
                        AnswerRequest {
                            question_id: question.question_id,
                            answer_index: 2,
                        },
                    )
                    .await
                    .unwrap_err();
                    assert!(matches!(replay, ServiceError::NotFound(_)));
                }
            }
        }

        let view = get_game(&app.state, &host, game_id).await.unwrap();
        assert_eq!(view.status, GameStatus::Finished);
        let results = game_service::game_results(&app.state, game_id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }
}
