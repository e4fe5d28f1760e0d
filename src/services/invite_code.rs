//! Invite code generation and allocation.

use rand::Rng;
use tracing::{debug, warn};

use crate::{
    dao::{
        datastore::{DatastoreError, Transaction},
        models::GameEntity,
    },
    error::ServiceError,
};

/// Number of characters in an invite code.
pub const CODE_LENGTH: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a code uniformly from the 36-symbol alphabet.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Canonical form used for lookups.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Store `game` under the first drawn code no other game holds.
///
/// Runs inside the caller's transaction, so the check and the insert are atomic.
pub(crate) fn assign_code(
    tx: &mut Transaction<'_>,
    mut game: GameEntity,
    max_attempts: u32,
    mut draw: impl FnMut() -> String,
) -> Result<String, ServiceError> {
    for attempt in 1..=max_attempts {
        let code = draw();
        game.invite_code = Some(code.clone());
        match tx.put(game.clone()) {
            Ok(()) => return Ok(code),
            Err(DatastoreError::UniqueViolation { .. }) => {
                debug!(attempt, "invite code already taken; drawing again");
            }
        }
    }

    warn!(max_attempts, "invite code space exhausted for this request");
    Err(ServiceError::Unavailable(
        "could not allocate a unique invite code".into(),
    ))
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use rand::{SeedableRng, rngs::StdRng};
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::{datastore::Datastore, models::Difficulty},
        state::state_machine::GamePhase,
    };

    fn waiting_game() -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            max_questions: 5,
            difficulty: Difficulty::Easy,
            topic: "addition".into(),
            invite_code: None,
            phase: GamePhase::Waiting,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn same_seed_gives_same_codes() {
        let mut first = StdRng::seed_from_u64(42);
        let mut second = StdRng::seed_from_u64(42);
        assert_eq!(generate_code(&mut first), generate_code(&mut second));
    }

    #[test]
    fn codes_are_normalized_for_lookup() {
        assert_eq!(normalize_code(" ab12cd "), "AB12CD");
    }

    #[tokio::test]
    async fn collisions_are_retried() {
        let (store, _journal) = Datastore::new();
        let mut taken = waiting_game();
        taken.invite_code = Some("AAAAAA".into());
        store.transact(|tx| tx.put(taken)).await.unwrap();

        let mut draws = vec!["BBBBBB".to_string(), "AAAAAA".to_string()];
        let game = waiting_game();
        let game_id = game.id;
        let code = store
            .transact(|tx| assign_code(tx, game, 5, || draws.pop().unwrap_or_default()))
            .await
            .unwrap();

        assert_eq!(code, "BBBBBB");
        store
            .read(|tables| {
                assert_eq!(tables.game_by_invite_code("BBBBBB").map(|g| g.id), Some(game_id));
            })
            .await;
    }

    #[tokio::test]
    async fn exhausted_attempts_leave_nothing_behind() {
        let (store, _journal) = Datastore::new();
        let mut taken = waiting_game();
        taken.invite_code = Some("AAAAAA".into());
        store.transact(|tx| tx.put(taken)).await.unwrap();

        let mut calls = 0;
        let result = store
            .transact(|tx| {
                assign_code(tx, waiting_game(), 3, || {
                    calls += 1;
                    "AAAAAA".to_string()
                })
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert_eq!(calls, 3);
        store.read(|tables| assert_eq!(tables.games.len(), 1)).await;
    }
}
