use axum::Router;

use crate::state::SharedState;

pub mod auth;
pub mod docs;
pub mod game;
pub mod health;
pub mod invitation;
pub mod player;
pub mod question;
pub mod settings;
pub mod sse;
pub mod webhooks;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(player::router())
        .merge(game::router())
        .merge(question::router())
        .merge(invitation::router())
        .merge(settings::router())
        .merge(sse::router())
        .merge(webhooks::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
