use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageMode},
    state::SharedState,
};

/// Report the storage mode and whether the persistent store currently answers.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.game_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
                state.update_degraded(true);
            }
            StorageMode::Mongodb
        }
        None => StorageMode::Memory,
    };
    let questions = state
        .datastore()
        .read(|tables| tables.questions.len())
        .await;

    HealthResponse::new(state.is_degraded(), storage, questions)
}
