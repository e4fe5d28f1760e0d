//! In-process transactional tables.
//!
//! Every mutation runs under a single write lock, so transactions are
//! serializable. Writes are journalled with undo actions: a failed
//! transaction leaves no trace, a successful one publishes the final state of
//! every row it touched so the storage supervisor can persist it.

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::dao::models::{
    Difficulty, EmailPreferencesEntity, GameEntity, InvitationEntity, ParticipantEntity,
    ParticipantQuestionEntity, PlayerEntity, QuestionEntity,
};

/// Errors raised while writing inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatastoreError {
    /// Another row already owns the unique key.
    #[error("unique index violation on `{table}` for key `{key}`")]
    UniqueViolation { table: &'static str, key: String },
}

/// Receiving end of the commit journal.
pub type Journal = mpsc::UnboundedReceiver<Vec<RecordChange>>;

/// Identifies a row across tables.
pub type RecordKey = (&'static str, Uuid);

/// Row stored in one of the [`Tables`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Table name, also used as collection name by persistent stores.
    const TABLE: &'static str;

    /// Primary key.
    fn id(&self) -> Uuid;

    /// Keys that must be unique across the table.
    fn unique_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Borrow the table holding rows of this type.
    fn table(tables: &Tables) -> &Table<Self>;

    /// Mutably borrow the table holding rows of this type.
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;

    /// Wrap the row for the persistence journal.
    fn into_change(self) -> RecordChange;
}

/// Committed row state published to the persistence journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Player(PlayerEntity),
    Game(GameEntity),
    Participant(ParticipantEntity),
    ParticipantQuestion(ParticipantQuestionEntity),
    Question(QuestionEntity),
    Invitation(InvitationEntity),
    EmailPreferences(EmailPreferencesEntity),
}

impl RecordChange {
    /// Table and primary key of the carried row.
    pub fn key(&self) -> RecordKey {
        match self {
            RecordChange::Player(row) => (PlayerEntity::TABLE, row.id),
            RecordChange::Game(row) => (GameEntity::TABLE, row.id),
            RecordChange::Participant(row) => (ParticipantEntity::TABLE, row.id),
            RecordChange::ParticipantQuestion(row) => (ParticipantQuestionEntity::TABLE, row.id),
            RecordChange::Question(row) => (QuestionEntity::TABLE, row.id),
            RecordChange::Invitation(row) => (InvitationEntity::TABLE, row.id),
            RecordChange::EmailPreferences(row) => (EmailPreferencesEntity::TABLE, row.id),
        }
    }
}

/// Rows of one table together with its unique index.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: IndexMap<Uuid, T>,
    unique: HashMap<String, Uuid>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
            unique: HashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    /// Fetch a row by primary key.
    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.rows.get(id)
    }

    /// Fetch the row owning a unique key.
    pub fn find_unique(&self, key: &str) -> Option<&T> {
        self.unique.get(key).and_then(|id| self.rows.get(id))
    }

    /// Iterate rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn put(&mut self, row: T) -> Result<Option<T>, DatastoreError> {
        let id = row.id();
        let keys = row.unique_keys();

        if let Some(key) = keys
            .iter()
            .find(|key| self.unique.get(*key).is_some_and(|owner| *owner != id))
        {
            return Err(DatastoreError::UniqueViolation {
                table: T::TABLE,
                key: key.clone(),
            });
        }

        let previous = self.rows.insert(id, row);
        if let Some(previous) = &previous {
            self.release_keys(previous.unique_keys(), id);
        }
        for key in keys {
            self.unique.insert(key, id);
        }

        Ok(previous)
    }

    fn remove(&mut self, id: Uuid) -> Option<T> {
        let row = self.rows.shift_remove(&id)?;
        self.release_keys(row.unique_keys(), id);
        Some(row)
    }

    fn release_keys(&mut self, keys: Vec<String>, id: Uuid) {
        for key in keys {
            if self.unique.get(&key) == Some(&id) {
                self.unique.remove(&key);
            }
        }
    }
}

/// All application tables.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub players: Table<PlayerEntity>,
    pub games: Table<GameEntity>,
    pub participants: Table<ParticipantEntity>,
    pub participant_questions: Table<ParticipantQuestionEntity>,
    pub questions: Table<QuestionEntity>,
    pub invitations: Table<InvitationEntity>,
    pub email_preferences: Table<EmailPreferencesEntity>,
}

pub(crate) fn user_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

pub(crate) fn username_key(username: &str) -> String {
    format!("username:{}", username.to_lowercase())
}

pub(crate) fn invite_code_key(code: &str) -> String {
    format!("code:{code}")
}

pub(crate) fn participant_key(game_id: Uuid, player_id: Uuid) -> String {
    format!("{game_id}:{player_id}")
}

pub(crate) fn served_question_key(game_id: Uuid, question_id: Uuid, player_id: Uuid) -> String {
    format!("{game_id}:{question_id}:{player_id}")
}

impl Tables {
    /// Rebuild tables (and their indexes) from persisted rows.
    pub fn hydrate(records: Vec<RecordChange>) -> Result<Self, DatastoreError> {
        let mut tables = Tables::default();
        for record in records {
            let (table, id) = record.key();
            let result = match record {
                RecordChange::Player(row) => tables.players.put(row).map(drop),
                RecordChange::Game(row) => tables.games.put(row).map(drop),
                RecordChange::Participant(row) => tables.participants.put(row).map(drop),
                RecordChange::ParticipantQuestion(row) => {
                    tables.participant_questions.put(row).map(drop)
                }
                RecordChange::Question(row) => tables.questions.put(row).map(drop),
                RecordChange::Invitation(row) => tables.invitations.put(row).map(drop),
                RecordChange::EmailPreferences(row) => tables.email_preferences.put(row).map(drop),
            };
            if let Err(err) = result {
                tracing::warn!(table, %id, error = %err, "persisted row violates a unique index");
                return Err(err);
            }
        }
        Ok(tables)
    }

    /// Player bound to an identity subject.
    pub fn player_by_user(&self, user_id: &str) -> Option<&PlayerEntity> {
        self.players.find_unique(&user_key(user_id))
    }

    /// Player owning a username (case-insensitive).
    pub fn player_by_username(&self, username: &str) -> Option<&PlayerEntity> {
        self.players.find_unique(&username_key(username))
    }

    /// Game currently holding an invite code.
    pub fn game_by_invite_code(&self, code: &str) -> Option<&GameEntity> {
        self.games.find_unique(&invite_code_key(code))
    }

    /// Participation of a player in a game.
    pub fn participant(&self, game_id: Uuid, player_id: Uuid) -> Option<&ParticipantEntity> {
        self.participants
            .find_unique(&participant_key(game_id, player_id))
    }

    /// All participations of a game, in join order.
    pub fn participants_of(&self, game_id: Uuid) -> impl Iterator<Item = &ParticipantEntity> {
        self.participants
            .iter()
            .filter(move |participant| participant.game_id == game_id)
    }

    /// Served question row for the (game, question, player) triple.
    pub fn served_question(
        &self,
        game_id: Uuid,
        question_id: Uuid,
        player_id: Uuid,
    ) -> Option<&ParticipantQuestionEntity> {
        self.participant_questions
            .find_unique(&served_question_key(game_id, question_id, player_id))
    }

    /// Questions served to a player in a game, in serving order.
    pub fn served_questions_of(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> impl Iterator<Item = &ParticipantQuestionEntity> {
        self.participant_questions
            .iter()
            .filter(move |row| row.game_id == game_id && row.player_id == player_id)
    }

    /// Question bank entries tagged with a topic and difficulty.
    pub fn questions_matching<'a>(
        &'a self,
        topic: &'a str,
        difficulty: Difficulty,
    ) -> impl Iterator<Item = &'a QuestionEntity> {
        self.questions
            .iter()
            .filter(move |question| question.topic == topic && question.difficulty == difficulty)
    }

    /// Invitations sent for a game.
    pub fn invitations_of(&self, game_id: Uuid) -> impl Iterator<Item = &InvitationEntity> {
        self.invitations
            .iter()
            .filter(move |invitation| invitation.game_id == game_id)
    }

    /// Notification preferences of a player.
    pub fn preferences_of(&self, player_id: Uuid) -> Option<&EmailPreferencesEntity> {
        self.email_preferences.find_unique(&player_id.to_string())
    }
}

macro_rules! impl_record {
    ($entity:ty, $table:literal, $field:ident, $variant:ident, |$row:ident| $keys:expr) => {
        impl Record for $entity {
            const TABLE: &'static str = $table;

            fn id(&self) -> Uuid {
                self.id
            }

            fn unique_keys(&self) -> Vec<String> {
                let $row = self;
                $keys
            }

            fn table(tables: &Tables) -> &Table<Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                &mut tables.$field
            }

            fn into_change(self) -> RecordChange {
                RecordChange::$variant(self)
            }
        }
    };
}

impl_record!(PlayerEntity, "players", players, Player, |row| vec![
    user_key(&row.user_id),
    username_key(&row.username)
]);
impl_record!(GameEntity, "games", games, Game, |row| row
    .invite_code
    .as_deref()
    .map(invite_code_key)
    .into_iter()
    .collect());
impl_record!(
    ParticipantEntity,
    "game_participants",
    participants,
    Participant,
    |row| vec![participant_key(row.game_id, row.player_id)]
);
impl_record!(
    ParticipantQuestionEntity,
    "game_participant_questions",
    participant_questions,
    ParticipantQuestion,
    |row| vec![served_question_key(row.game_id, row.question_id, row.player_id)]
);
impl_record!(QuestionEntity, "questions", questions, Question, |_row| Vec::new());
impl_record!(InvitationEntity, "game_invitations", invitations, Invitation, |_row| {
    Vec::new()
});
impl_record!(
    EmailPreferencesEntity,
    "email_preferences",
    email_preferences,
    EmailPreferences,
    |row| vec![row.player_id.to_string()]
);

type Undo = Box<dyn FnOnce(&mut Tables) + Send>;
type Collect = fn(&Tables, Uuid) -> Option<RecordChange>;

fn collect_change<T: Record>(tables: &Tables, id: Uuid) -> Option<RecordChange> {
    T::table(tables).get(&id).cloned().map(T::into_change)
}

/// Write access to the tables for the duration of one transaction.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    touched: IndexMap<RecordKey, Collect>,
}

impl<'a> Transaction<'a> {
    fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            touched: IndexMap::new(),
        }
    }

    /// Read view including the writes made so far.
    pub fn tables(&self) -> &Tables {
        self.tables
    }

    /// Fetch a row by primary key.
    pub fn get<T: Record>(&self, id: Uuid) -> Option<&T> {
        T::table(self.tables).get(&id)
    }

    /// Insert or replace a row, enforcing the table's unique keys.
    pub fn put<T: Record>(&mut self, row: T) -> Result<(), DatastoreError> {
        let id = row.id();
        let previous = T::table_mut(self.tables).put(row)?;

        self.undo.push(Box::new(move |tables: &mut Tables| {
            let table = T::table_mut(tables);
            match previous {
                Some(previous) => {
                    let _ = table.put(previous);
                }
                None => {
                    table.remove(id);
                }
            }
        }));
        self.touched
            .entry((T::TABLE, id))
            .or_insert(collect_change::<T>);

        Ok(())
    }

    fn commit(self) -> Vec<RecordChange> {
        let Transaction {
            tables, touched, ..
        } = self;
        touched
            .into_iter()
            .filter_map(|((_, id), collect)| collect(tables, id))
            .collect()
    }

    fn rollback(self) {
        let Transaction { tables, undo, .. } = self;
        for action in undo.into_iter().rev() {
            action(tables);
        }
    }
}

/// Shared handle over the application tables.
pub struct Datastore {
    tables: RwLock<Tables>,
    journal: mpsc::UnboundedSender<Vec<RecordChange>>,
}

impl Datastore {
    /// Create an empty datastore and the receiving end of its commit journal.
    pub fn new() -> (Self, Journal) {
        let (journal, receiver) = mpsc::unbounded_channel();
        let store = Self {
            tables: RwLock::new(Tables::default()),
            journal,
        };
        (store, receiver)
    }

    /// Swap in tables loaded from persistent storage.
    pub async fn replace(&self, tables: Tables) {
        let mut guard = self.tables.write().await;
        *guard = tables;
    }

    /// Run a query against a consistent snapshot.
    pub async fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> T {
        let guard = self.tables.read().await;
        query(&guard)
    }

    /// Run `work` atomically: either every write is applied or none is.
    pub async fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    {
        let mut guard = self.tables.write().await;
        let mut tx = Transaction::new(&mut guard);

        match work(&mut tx) {
            Ok(value) => {
                let changes = tx.commit();
                if !changes.is_empty() {
                    // Nobody listening simply means nothing is persisted.
                    let _ = self.journal.send(changes);
                }
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::state_machine::GamePhase;

    fn game(code: &str) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            max_questions: 5,
            difficulty: Difficulty::Easy,
            topic: "addition".into(),
            invite_code: Some(code.into()),
            phase: GamePhase::Waiting,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let (store, _journal) = Datastore::new();
        let existing = game("AAAAAA");
        store
            .transact(|tx| tx.put(existing.clone()))
            .await
            .unwrap();

        let result: Result<(), &str> = store
            .transact(|tx| {
                let mut renamed = existing.clone();
                renamed.invite_code = Some("BBBBBB".into());
                tx.put(renamed).map_err(|_| "put")?;
                tx.put(game("CCCCCC")).map_err(|_| "put")?;
                Err("abort")
            })
            .await;
        assert_eq!(result, Err("abort"));

        store
            .read(|tables| {
                assert_eq!(tables.games.len(), 1);
                assert_eq!(tables.game_by_invite_code("AAAAAA"), Some(&existing));
                assert!(tables.game_by_invite_code("BBBBBB").is_none());
                assert!(tables.game_by_invite_code("CCCCCC").is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn unique_keys_are_enforced() {
        let (store, _journal) = Datastore::new();
        store.transact(|tx| tx.put(game("ABC123"))).await.unwrap();

        let err = store
            .transact(|tx| tx.put(game("ABC123")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DatastoreError::UniqueViolation {
                table: "games",
                key: "code:ABC123".into(),
            }
        );
    }

    #[tokio::test]
    async fn clearing_a_key_releases_it() {
        let (store, _journal) = Datastore::new();
        let mut first = game("ZZZZZZ");
        store.transact(|tx| tx.put(first.clone())).await.unwrap();

        first.invite_code = None;
        store.transact(|tx| tx.put(first.clone())).await.unwrap();
        store.transact(|tx| tx.put(game("ZZZZZZ"))).await.unwrap();

        store
            .read(|tables| assert_eq!(tables.games.len(), 2))
            .await;
    }

    #[tokio::test]
    async fn commit_publishes_final_state_once_per_row() {
        let (store, mut journal) = Datastore::new();
        let mut row = game("QWERTY");

        store
            .transact(|tx| {
                tx.put(row.clone())?;
                row.max_questions = 10;
                tx.put(row.clone())
            })
            .await
            .unwrap();

        let batch = journal.recv().await.unwrap();
        assert_eq!(batch, vec![RecordChange::Game(row)]);
    }

    #[test]
    fn hydrate_rebuilds_indexes() {
        let row = game("HYDRA7");
        let tables = Tables::hydrate(vec![RecordChange::Game(row.clone())]).unwrap();
        assert_eq!(tables.game_by_invite_code("HYDRA7"), Some(&row));
    }
}
