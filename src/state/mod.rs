pub mod sse;
pub mod state_machine;

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{
        datastore::{Datastore, Journal},
        game_store::GameStore,
    },
    services::{mailer::Mailer, question_generator::ContentGenerator},
};

pub use self::sse::{GameChannels, SseHub};

pub type SharedState = Arc<AppState>;

const GAME_CHANNEL_CAPACITY: usize = 32;

/// Central application state: tables, collaborators, realtime channels and the storage handle.
pub struct AppState {
    datastore: Datastore,
    config: AppConfig,
    mailer: Arc<dyn Mailer>,
    generator: Arc<dyn ContentGenerator>,
    rng: Mutex<StdRng>,
    games: GameChannels,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] together with the commit journal
    /// consumed by the storage supervisor.
    ///
    /// The application runs in memory until a storage backend is installed; it is only
    /// degraded once an installed backend stops answering.
    pub fn new(
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        generator: Arc<dyn ContentGenerator>,
        rng: StdRng,
    ) -> (SharedState, Journal) {
        let (datastore, journal) = Datastore::new();
        let (degraded_tx, _rx) = watch::channel(false);
        let state = Arc::new(Self {
            datastore,
            config,
            mailer,
            generator,
            rng: Mutex::new(rng),
            games: GameChannels::new(GAME_CHANNEL_CAPACITY),
            game_store: RwLock::new(None),
            degraded: degraded_tx,
        });
        (state, journal)
    }

    pub fn datastore(&self) -> &Datastore {
        &self.datastore
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mailer(&self) -> Arc<dyn Mailer> {
        self.mailer.clone()
    }

    pub fn generator(&self) -> Arc<dyn ContentGenerator> {
        self.generator.clone()
    }

    /// Run `draw` with the shared random generator. Never call across an `.await`.
    pub fn with_rng<T>(&self, draw: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut guard)
    }

    /// Per-game SSE hubs.
    pub fn game_channels(&self) -> &GameChannels {
        &self.games
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a storage backend.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        let mut guard = self.game_store.write().await;
        *guard = Some(store);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
