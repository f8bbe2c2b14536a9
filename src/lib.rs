#![allow(clippy::new_without_default)]

use std::sync::Arc;

pub mod clock;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod fcm;
pub mod firestore;
pub mod logger;
pub mod prefs;
pub mod reminders;
pub mod roster;
pub mod rtdb;
pub mod scheduler;
pub mod server;
pub mod timetable;

use crate::dedup::SentCache;
use crate::fcm::Notifier;
use crate::roster::RosterSource;
use crate::timetable::TimetableSource;

/// Everything one reminder pass needs, assembled once at startup.
///
/// The sources and the notifier sit behind traits so tests can drive the
/// engine with in-memory fixtures instead of remote stores.
pub struct Context {
    pub roster: Arc<dyn RosterSource>,
    pub timetable: Arc<dyn TimetableSource>,
    pub notifier: Arc<dyn Notifier>,
    pub sent: SentCache,
    pub timezone: chrono_tz::Tz,
}
