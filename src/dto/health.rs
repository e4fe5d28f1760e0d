use serde::Serialize;
use utoipa::ToSchema;

/// Where committed rows end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// No persistent store configured.
    Memory,
    /// Rows are mirrored to MongoDB.
    Mongodb,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Active storage mode.
    pub storage: StorageMode,
    /// Size of the question bank.
    pub questions: usize,
}

impl HealthResponse {
    /// Build a response, reporting `degraded` when the persistent store is unreachable.
    pub fn new(degraded: bool, storage: StorageMode, questions: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            storage,
            questions,
        }
    }
}
