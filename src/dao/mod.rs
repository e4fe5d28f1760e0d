/// Transactional in-process tables.
pub mod datastore;
/// Persistence backends for committed rows.
pub mod game_store;
/// Persisted entity definitions.
pub mod models;
/// Built-in question bank.
pub mod seed;
/// Storage error types shared by backends.
pub mod storage;
