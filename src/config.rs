use std::net::SocketAddr;

use anyhow::Context as _;
use chrono_tz::Tz;
use secrecy::SecretString;

/// Process configuration, read once at startup.
///
/// Anything invalid here is fatal before the first tick; per-tick code never
/// revalidates it.
pub struct Config {
    /// Civil timezone the timetables are written in.
    pub timezone: Tz,
    pub firestore_project: String,
    pub firebase_api_key: String,
    pub rtdb_url: String,
    pub fcm_server_key: SecretString,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let timezone = std::env::var("CLASS_TIMEZONE").unwrap_or_else(|_| "Asia/Kolkata".into());
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unresolvable timezone {timezone:?}: {e}"))?;

        let port = match std::env::var("PORT") {
            Ok(port) => port
                .parse::<u16>()
                .with_context(|| format!("PORT is not a port number: {port:?}"))?,
            Err(_) => 8000,
        };

        Ok(Config {
            timezone,
            firestore_project: require("FIRESTORE_PROJECT_ID")?,
            firebase_api_key: require("FIREBASE_API_KEY")?,
            rtdb_url: require("FIREBASE_DATABASE_URL")?,
            fcm_server_key: require("FCM_SERVER_KEY")?.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        })
    }
}

fn require(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("missing required env var {name}"))
}
