use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

// One stuck send must not stall the whole pass.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// A rendered reminder, ready to hand to the push provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug)]
pub enum SendError {
    /// The provider reports the destination token permanently gone. Logged,
    /// never retried; token cleanup happens outside this service.
    Unregistered,
    /// Anything else: network trouble, provider 5xx, undecodable response.
    Transient(anyhow::Error),
}

impl std::error::Error for SendError {}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SendError::Unregistered => write!(f, "push token is no longer registered"),
            SendError::Transient(e) => write!(f, "push delivery failed: {e}"),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, token: &str, push: &Push) -> Result<(), SendError>;
}

/// FCM legacy HTTP client.
pub struct FcmClient {
    client: reqwest::Client,
    server_key: SecretString,
}

#[derive(Debug, serde::Deserialize)]
struct FcmResponse {
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, serde::Deserialize)]
struct FcmResult {
    error: Option<String>,
}

impl FcmClient {
    pub fn new(server_key: SecretString) -> anyhow::Result<FcmClient> {
        Ok(FcmClient {
            client: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .context("building FCM http client")?,
            server_key,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for FcmClient {
    async fn send(&self, token: &str, push: &Push) -> Result<(), SendError> {
        let payload = serde_json::json!({
            "to": token,
            "priority": "high",
            "notification": {
                "title": push.title,
                "body": push.body,
                "sound": "default",
                "icon": "@mipmap/ic_launcher",
                "color": "#172C3D",
                "android_channel_id": "high_importance_channel",
            },
            "data": push.data,
        });

        let resp = self
            .client
            .post(FCM_SEND_URL)
            .header(
                AUTHORIZATION,
                format!("key={}", self.server_key.expose_secret()),
            )
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Transient(e.into()))?
            .error_for_status()
            .map_err(|e| SendError::Transient(e.into()))?;

        let body: FcmResponse = resp
            .json()
            .await
            .map_err(|e| SendError::Transient(anyhow::Error::from(e).context("decoding FCM response")))?;

        if let Some(error) = body.results.first().and_then(|r| r.error.as_deref()) {
            return Err(match error {
                "NotRegistered" | "InvalidRegistration" | "MissingRegistration" => {
                    SendError::Unregistered
                }
                _ => SendError::Transient(anyhow::anyhow!("provider error: {error}")),
            });
        }

        Ok(())
    }
}
