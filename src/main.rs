//! MathRush Back binary entrypoint wiring REST, SSE, email jobs and the MongoDB mirror.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use mathrush_back::{
    config::AppConfig,
    dao::seed,
    routes,
    services::{
        mailer::{LogMailer, Mailer, ResendMailer},
        notification_service,
        question_generator::{CannedGenerator, ContentGenerator, OpenAiGenerator},
        scheduler, storage_supervisor,
    },
    state::{AppState, SharedState},
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let seed_questions = config.seed_questions;
    let daily_schedule = config.daily_schedule;
    let weekly_schedule = config.weekly_schedule;

    let (app_state, journal) =
        AppState::new(config, mailer(), generator(), StdRng::from_os_rng());

    attach_store(&app_state).await?;
    tokio::spawn(storage_supervisor::run_journal(app_state.clone(), journal));

    if seed_questions {
        seed::seed_question_bank(app_state.datastore())
            .await
            .context("seeding question bank")?;
    }

    let daily_state = app_state.clone();
    scheduler::spawn_recurring("daily-question", daily_schedule, move || {
        let state = daily_state.clone();
        async move {
            notification_service::send_daily_question(&state).await;
        }
    });
    let weekly_state = app_state.clone();
    scheduler::spawn_recurring("weekly-digest", weekly_schedule, move || {
        let state = weekly_state.clone();
        async move {
            notification_service::send_weekly_digest(&state).await;
        }
    });

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn mailer() -> Arc<dyn Mailer> {
    match env::var("RESEND_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(ResendMailer::new(key)),
        _ => {
            warn!("RESEND_API_KEY not set; emails are logged instead of sent");
            Arc::new(LogMailer)
        }
    }
}

fn generator() -> Arc<dyn ContentGenerator> {
    match env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            Arc::new(OpenAiGenerator::new(key, env::var("OPENAI_MODEL").ok()))
        }
        _ => {
            info!("OPENAI_API_KEY not set; using canned email content");
            Arc::new(CannedGenerator)
        }
    }
}

/// Load the persisted rows and install the MongoDB mirror when `MONGO_URI` is set.
#[cfg(feature = "mongo-store")]
async fn attach_store(state: &SharedState) -> anyhow::Result<()> {
    use mathrush_back::{
        dao::{
            datastore::Tables,
            game_store::{
                GameStore,
                mongodb::{MongoConfig, MongoGameStore},
            },
        },
        services::game_service,
    };

    let Some(mongo_config) = MongoConfig::from_env()
        .await
        .context("reading MongoDB configuration")?
    else {
        info!("MONGO_URI not set; running in memory only");
        return Ok(());
    };

    let store: Arc<dyn GameStore> = Arc::new(
        MongoGameStore::connect(mongo_config)
            .await
            .context("connecting to MongoDB")?,
    );
    let records = store.load_all().await.context("loading persisted rows")?;
    let count = records.len();
    let tables = Tables::hydrate(records).context("rebuilding tables")?;
    state.datastore().replace(tables).await;
    state.set_game_store(store.clone()).await;
    info!(rows = count, "restored persisted rows from MongoDB");
    game_service::resume_expiry(state).await;

    tokio::spawn(storage_supervisor::run(state.clone(), store));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
async fn attach_store(_state: &SharedState) -> anyhow::Result<()> {
    info!("built without a persistent store; running in memory only");
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
