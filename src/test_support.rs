//! Fixtures shared by service tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use rand::{SeedableRng, rngs::StdRng};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{models::Difficulty, seed},
    dto::game::CreateGameRequest,
    services::{
        game_service,
        identity::Identity,
        mailer::{MailError, Mailer, OutgoingEmail},
        player_service,
        question_generator::CannedGenerator,
    },
    state::{AppState, SharedState},
};

/// Mailer keeping every email in memory; chosen recipients are rejected.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    /// Reject every email addressed to `recipient`.
    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    /// Emails accepted so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, Result<String, MailError>> {
        let result = if self.failing.lock().unwrap().contains(&email.to) {
            Err(MailError::Rejected {
                status: 422,
                body: "recipient rejected".into(),
            })
        } else {
            let mut sent = self.sent.lock().unwrap();
            sent.push(email);
            Ok(format!("msg-{}", sent.len()))
        };
        Box::pin(async move { result })
    }
}

/// Application state wired with test doubles.
pub struct TestApp {
    pub state: SharedState,
    pub mailer: Arc<RecordingMailer>,
}

/// Build a state with the seeded question bank and a deterministic generator.
pub async fn test_app(config: AppConfig) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let (state, _journal) = AppState::new(
        config,
        mailer.clone(),
        Arc::new(CannedGenerator),
        StdRng::seed_from_u64(7),
    );
    seed::seed_question_bank(state.datastore())
        .await
        .unwrap();
    TestApp { state, mailer }
}

/// Build a state with default configuration.
pub async fn default_app() -> TestApp {
    test_app(AppConfig::default()).await
}

/// Identity of a test user named `name`.
pub fn identity(name: &str) -> Identity {
    Identity {
        subject: format!("auth|{name}"),
        email: Some(format!("{name}@example.com")),
    }
}

/// Register `name` and return its identity.
pub async fn register(state: &SharedState, name: &str) -> Identity {
    let identity = identity(name);
    player_service::register_player(state, &identity, name)
        .await
        .unwrap();
    identity
}

/// Create an easy addition game hosted by `host`.
pub async fn create_game(state: &SharedState, host: &Identity, max_questions: u32) -> (Uuid, String) {
    let response = game_service::create_game(
        state,
        host,
        CreateGameRequest {
            max_questions,
            difficulty: Difficulty::Easy,
            topic: "addition".into(),
        },
    )
    .await
    .unwrap();
    (response.game_id, response.invite_code)
}

/// Index of the right option for a question.
pub async fn correct_answer(state: &SharedState, question_id: Uuid) -> u8 {
    state
        .datastore()
        .read(|tables| tables.questions.get(&question_id).map(|q| q.correct_answer))
        .await
        .unwrap()
}
