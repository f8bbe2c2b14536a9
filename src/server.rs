//! Diagnostics and preferences HTTP surface.
//!
//! Everything here only reads or signals scheduler state; the one endpoint
//! that does real work (`/scheduler/trigger`) blocks the calling request for
//! the duration of a single pass, which is acceptable for diagnostics.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::errors::AppError;
use crate::firestore::FirestoreClient;
use crate::prefs::{Preferences, PreferencesUpdate};
use crate::reminders::PassSummary;
use crate::scheduler::Scheduler;

pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub prefs: Arc<FirestoreClient>,
    /// Whether the remote stores were reachable and configured at startup.
    pub source_ready: bool,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/scheduler/start", post(scheduler_start))
        .route("/scheduler/stop", post(scheduler_stop))
        .route("/scheduler/trigger", post(scheduler_trigger))
        .route(
            "/users/{uid}/preferences",
            get(get_preferences).put(put_preferences),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "classbot is alive"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    source_ready: bool,
    scheduler_running: bool,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Status> {
    Json(Status {
        source_ready: state.source_ready,
        scheduler_running: state.scheduler.is_running(),
    })
}

async fn scheduler_start(State(state): State<Arc<AppState>>) -> &'static str {
    state.scheduler.start().await;
    "scheduler started"
}

async fn scheduler_stop(State(state): State<Arc<AppState>>) -> &'static str {
    state.scheduler.stop().await;
    "scheduler stopped"
}

async fn scheduler_trigger(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PassSummary>, AppError> {
    let summary = state.scheduler.run_once().await?;
    Ok(Json(summary))
}

async fn get_preferences(
    Path(uid): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, AppError> {
    Ok(Json(state.prefs.preferences(&uid).await?))
}

async fn put_preferences(
    Path(uid): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, AppError> {
    state.prefs.update_preferences(&uid, &update).await?;
    Ok(Json(state.prefs.preferences(&uid).await?))
}
