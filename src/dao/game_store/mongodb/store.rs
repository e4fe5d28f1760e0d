use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRecord, doc_id},
};
use crate::dao::{
    datastore::{Record, RecordChange},
    game_store::GameStore,
    models::{
        EmailPreferencesEntity, GameEntity, InvitationEntity, ParticipantEntity,
        ParticipantQuestionEntity, PlayerEntity, QuestionEntity,
    },
    storage::StorageResult,
};

struct UniqueIndex {
    collection: &'static str,
    name: &'static str,
    keys: Document,
    partial: Option<Document>,
}

fn unique_indexes() -> Vec<UniqueIndex> {
    vec![
        UniqueIndex {
            collection: PlayerEntity::TABLE,
            name: "player_user_idx",
            keys: doc! {"user_id": 1},
            partial: None,
        },
        UniqueIndex {
            collection: PlayerEntity::TABLE,
            name: "player_username_idx",
            keys: doc! {"username": 1},
            partial: None,
        },
        // Finished games release their code, so only assigned codes are indexed.
        UniqueIndex {
            collection: GameEntity::TABLE,
            name: "game_invite_code_idx",
            keys: doc! {"invite_code": 1},
            partial: Some(doc! {"invite_code": {"$type": "string"}}),
        },
        UniqueIndex {
            collection: ParticipantEntity::TABLE,
            name: "participant_game_player_idx",
            keys: doc! {"game_id": 1, "player_id": 1},
            partial: None,
        },
        UniqueIndex {
            collection: ParticipantQuestionEntity::TABLE,
            name: "participant_question_triple_idx",
            keys: doc! {"game_id": 1, "question_id": 1, "player_id": 1},
            partial: None,
        },
        UniqueIndex {
            collection: EmailPreferencesEntity::TABLE,
            name: "email_preferences_player_idx",
            keys: doc! {"player_id": 1},
            partial: None,
        },
    ]
}

/// [`GameStore`] keeping one MongoDB collection per table.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for index in unique_indexes() {
            let options = IndexOptions::builder()
                .name(Some(index.name.to_owned()))
                .unique(Some(true))
                .partial_filter_expression(index.partial)
                .build();
            let model = IndexModel::builder()
                .keys(index.keys)
                .options(options)
                .build();

            database
                .collection::<Document>(index.collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: index.collection,
                    index: index.name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn persist_changes(&self, changes: Vec<RecordChange>) -> MongoResult<()> {
        let database = self.database().await;
        let count = changes.len();

        for change in changes {
            match change {
                RecordChange::Player(row) => upsert(&database, row).await?,
                RecordChange::Game(row) => upsert(&database, row).await?,
                RecordChange::Participant(row) => upsert(&database, row).await?,
                RecordChange::ParticipantQuestion(row) => upsert(&database, row).await?,
                RecordChange::Question(row) => upsert(&database, row).await?,
                RecordChange::Invitation(row) => upsert(&database, row).await?,
                RecordChange::EmailPreferences(row) => upsert(&database, row).await?,
            }
        }

        debug!(count, "persisted rows to MongoDB");
        Ok(())
    }

    async fn load_everything(&self) -> MongoResult<Vec<RecordChange>> {
        let database = self.database().await;
        let mut rows = Vec::new();

        rows.extend(load::<PlayerEntity>(&database).await?);
        rows.extend(load::<QuestionEntity>(&database).await?);
        rows.extend(load::<GameEntity>(&database).await?);
        rows.extend(load::<ParticipantEntity>(&database).await?);
        rows.extend(load::<ParticipantQuestionEntity>(&database).await?);
        rows.extend(load::<InvitationEntity>(&database).await?);
        rows.extend(load::<EmailPreferencesEntity>(&database).await?);

        Ok(rows)
    }
}

async fn upsert<T>(database: &Database, row: T) -> MongoResult<()>
where
    T: Record + Serialize,
{
    let id = row.id();
    database
        .collection::<MongoRecord<T>>(T::TABLE)
        .replace_one(doc_id(id), MongoRecord::new(row))
        .upsert(true)
        .await
        .map_err(|source| MongoDaoError::Persist {
            collection: T::TABLE,
            id,
            source,
        })?;
    Ok(())
}

async fn load<T>(database: &Database) -> MongoResult<Vec<RecordChange>>
where
    T: Record + DeserializeOwned + Unpin,
{
    let documents: Vec<MongoRecord<T>> = database
        .collection::<MongoRecord<T>>(T::TABLE)
        .find(doc! {})
        .await
        .map_err(|source| MongoDaoError::Load {
            collection: T::TABLE,
            source,
        })?
        .try_collect()
        .await
        .map_err(|source| MongoDaoError::Load {
            collection: T::TABLE,
            source,
        })?;

    Ok(documents
        .into_iter()
        .map(|document| document.into_row().into_change())
        .collect())
}

impl GameStore for MongoGameStore {
    fn persist(&self, changes: Vec<RecordChange>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.persist_changes(changes).await.map_err(Into::into) })
    }

    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<RecordChange>>> {
        let store = self.clone();
        Box::pin(async move { store.load_everything().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
