use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{game_service, identity::Identity, sse_events::EVENT_GAME_SNAPSHOT},
    state::{SharedState, state_machine::GameStatus},
};

/// Live subscription to one game.
pub struct GameSubscription {
    /// Caller's view of the game at subscription time.
    pub snapshot: ServerEvent,
    /// Further events; absent once the game is over.
    pub receiver: Option<broadcast::Receiver<ServerEvent>>,
}

/// Subscribe a participant to the events of a game.
///
/// The receiver is registered before the snapshot is taken so no event falls in between.
pub async fn subscribe_game(
    state: &SharedState,
    identity: &Identity,
    game_id: Uuid,
) -> Result<GameSubscription, ServiceError> {
    let receiver = state.game_channels().subscribe(game_id);
    let view = match game_service::get_game(state, identity, game_id).await {
        Ok(view) => view,
        Err(err) => {
            drop(receiver);
            state.game_channels().release_if_idle(game_id);
            return Err(err);
        }
    };

    let finished = view.status == GameStatus::Finished;
    let snapshot = ServerEvent::json(Some(EVENT_GAME_SNAPSHOT.to_string()), &view)
        .map_err(|err| ServiceError::InvalidState(format!("unserializable snapshot: {err}")))?;

    if finished {
        // A hub created for a game that is already over would never be closed.
        state.game_channels().close(game_id);
    }

    Ok(GameSubscription {
        snapshot,
        receiver: (!finished).then_some(receiver),
    })
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a game subscription into an SSE response, forwarding events until the
/// game closes its channel or the client disconnects.
pub fn to_sse_stream(
    subscription: GameSubscription,
    game_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let GameSubscription { snapshot, receiver } = subscription;
        if tx.send(Ok(to_event(snapshot))).await.is_err() {
            return;
        }

        if let Some(mut receiver) = receiver {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    recv_result = receiver.recv() => {
                        match recv_result {
                            Ok(payload) => {
                                if tx.send(Ok(to_event(payload))).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Closed) => break,
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::debug!(%game_id, skipped, "game SSE subscriber lagged");
                                continue;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(%game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
