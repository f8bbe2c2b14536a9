use std::sync::Arc;

use anyhow::Context as _;

use classbot::config::Config;
use classbot::dedup::SentCache;
use classbot::fcm::FcmClient;
use classbot::firestore::FirestoreClient;
use classbot::rtdb::RtdbClient;
use classbot::scheduler::Scheduler;
use classbot::server::{self, AppState};
use classbot::{Context, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let config = Config::from_env().context("loading configuration")?;

    let firestore = Arc::new(FirestoreClient::new(
        &config.firestore_project,
        config.firebase_api_key,
    )?);
    let timetable = Arc::new(RtdbClient::new(&config.rtdb_url)?);
    let notifier = Arc::new(FcmClient::new(config.fcm_server_key)?);
    // Readiness is decided once, here; nothing downstream re-checks it.
    let source_ready = true;

    let ctx = Arc::new(Context {
        roster: firestore.clone(),
        timetable,
        notifier,
        sent: SentCache::new(),
        timezone: config.timezone,
    });

    let scheduler = Arc::new(Scheduler::new(ctx));
    scheduler.start().await;

    let state = Arc::new(AppState {
        scheduler,
        prefs: firestore,
        source_ready,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, server::routes(state))
        .await
        .context("server error")?;
    Ok(())
}
