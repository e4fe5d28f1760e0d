use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        datastore::{Journal, RecordChange, RecordKey},
        game_store::GameStore,
        storage::StorageResult,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;
const FLUSH_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Watch the persistent store and keep the shared state in degraded mode while it is unreachable.
pub async fn run(state: SharedState, store: Arc<dyn GameStore>) {
    let mut delay = INITIAL_DELAY;

    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                delay = INITIAL_DELAY;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                debug!(error = %err, "storage health check failed");
                if try_reconnect(&state, store.as_ref()).await {
                    info!("storage reconnection succeeded after health check failure");
                    state.update_degraded(false);
                    sleep(HEALTH_POLL_INTERVAL).await;
                } else {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
}

async fn try_reconnect(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering in degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Rows waiting to be written, keyed by table and id so only the latest state of a row is kept.
#[derive(Debug, Default)]
struct Backlog {
    pending: IndexMap<RecordKey, RecordChange>,
}

impl Backlog {
    fn push(&mut self, changes: Vec<RecordChange>) {
        for change in changes {
            let key = change.key();
            self.pending.shift_remove(&key);
            self.pending.insert(key, change);
        }
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand the backlog to `persist`; rows stay queued when it fails.
    async fn flush<F>(&mut self, persist: F) -> bool
    where
        F: FnOnce(Vec<RecordChange>) -> BoxFuture<'static, StorageResult<()>>,
    {
        if self.is_empty() {
            return true;
        }
        let batch: Vec<RecordChange> = self.pending.values().cloned().collect();
        let count = batch.len();
        match persist(batch).await {
            Ok(()) => {
                self.pending.clear();
                debug!(count, "persisted committed rows");
                true
            }
            Err(err) => {
                warn!(count, error = %err, "failed to persist committed rows; will retry");
                false
            }
        }
    }
}

/// Mirror every committed transaction into the persistent store.
///
/// Runs until the datastore is dropped. Without an installed store the rows are discarded.
pub async fn run_journal(state: SharedState, mut journal: Journal) {
    let mut backlog = Backlog::default();
    let mut retry = interval(FLUSH_RETRY_INTERVAL);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = journal.recv() => {
                let Some(changes) = received else {
                    break;
                };
                backlog.push(changes);
                while let Ok(changes) = journal.try_recv() {
                    backlog.push(changes);
                }
            }
            _ = retry.tick(), if !backlog.is_empty() => {}
        }
        flush(&state, &mut backlog).await;
    }

    if !backlog.is_empty() {
        flush(&state, &mut backlog).await;
    }
    info!(pending = backlog.len(), "persistence journal closed");
}

async fn flush(state: &SharedState, backlog: &mut Backlog) {
    let Some(store) = state.game_store().await else {
        backlog.pending.clear();
        return;
    };
    let persisted = backlog.flush(|batch| store.persist(batch)).await;
    if !persisted {
        state.update_degraded(true);
    } else if state.is_degraded() {
        state.update_degraded(false);
    }
}
