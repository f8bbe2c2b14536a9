//! Firestore REST client backing the user roster and preference storage.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::prefs::{Preferences, PreferencesUpdate};
use crate::roster::{RosterSource, UserProfile, normalize_lead_minutes};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: usize = 300;

pub struct FirestoreClient {
    client: reqwest::Client,
    /// `…/v1/projects/{project}/databases/(default)/documents`
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentList {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FireValue>,
}

/// One Firestore typed value. The REST representation wraps every value in
/// an object with a single `*Value` key; everything is optional here and the
/// accessors pick whichever is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FireValue {
    string_value: Option<String>,
    integer_value: Option<String>,
    double_value: Option<f64>,
    boolean_value: Option<bool>,
    array_value: Option<ArrayValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ArrayValue {
    values: Vec<FireValue>,
}

impl FireValue {
    fn as_str(&self) -> Option<&str> {
        self.string_value.as_deref()
    }

    fn as_bool(&self) -> Option<bool> {
        self.boolean_value
    }

    fn as_int(&self) -> Option<i64> {
        if let Some(n) = &self.integer_value {
            return n.parse().ok();
        }
        if let Some(d) = self.double_value {
            return Some(d as i64);
        }
        self.string_value.as_deref()?.trim().parse().ok()
    }

    fn as_string_list(&self) -> Vec<String> {
        match &self.array_value {
            Some(array) => array
                .values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl FirestoreClient {
    pub fn new(project_id: &str, api_key: String) -> anyhow::Result<FirestoreClient> {
        Ok(FirestoreClient {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("building Firestore http client")?,
            base_url: format!(
                "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents"
            ),
            api_key,
        })
    }

    /// Page tokens are opaque; build the query with proper encoding rather
    /// than trusting them to be URL-safe.
    fn user_list_url(&self, page_token: Option<&str>) -> anyhow::Result<Url> {
        let mut url = Url::parse(&format!("{}/users", self.base_url))
            .context("building user list url")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("pageSize", &PAGE_SIZE.to_string());
            pairs.append_pair("key", &self.api_key);
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    async fn list_user_documents(&self) -> anyhow::Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.user_list_url(page_token.as_deref())?;
            let page: DocumentList = self
                .client
                .get(url)
                .send()
                .await
                .context("listing user documents")?
                .error_for_status()
                .context("listing user documents")?
                .json()
                .await
                .context("decoding user documents")?;
            documents.extend(page.documents);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(documents)
    }

    pub async fn preferences(&self, uid: &str) -> anyhow::Result<Preferences> {
        let url = format!(
            "{}/users/{}?mask.fieldPaths=notificationsEnabled&mask.fieldPaths=notifyMinutesBefore&key={}",
            self.base_url, uid, self.api_key
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching preferences for {uid}"))?;
        // A user without a profile document gets the defaults.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Preferences::default());
        }
        let doc: Document = resp
            .error_for_status()
            .with_context(|| format!("fetching preferences for {uid}"))?
            .json()
            .await
            .context("decoding preferences document")?;
        Ok(Preferences {
            notifications_enabled: doc
                .fields
                .get("notificationsEnabled")
                .and_then(FireValue::as_bool)
                .unwrap_or(true),
            notify_minutes_before: normalize_lead_minutes(
                doc.fields.get("notifyMinutesBefore").and_then(FireValue::as_int),
            ),
        })
    }

    /// Merge-write: only the provided fields land in the update mask, so
    /// everything else on the document is preserved. An out-of-range lead
    /// time fails validation before anything is written.
    pub async fn update_preferences(
        &self,
        uid: &str,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<()> {
        update.validate()?;
        if update.is_empty() {
            return Ok(());
        }

        let mut fields = serde_json::Map::new();
        let mut mask = Vec::new();
        if let Some(enabled) = update.notifications_enabled {
            fields.insert(
                "notificationsEnabled".into(),
                serde_json::json!({"booleanValue": enabled}),
            );
            mask.push("updateMask.fieldPaths=notificationsEnabled");
        }
        if let Some(lead) = update.notify_minutes_before {
            fields.insert(
                "notifyMinutesBefore".into(),
                serde_json::json!({"integerValue": lead.to_string()}),
            );
            mask.push("updateMask.fieldPaths=notifyMinutesBefore");
        }

        let url = format!(
            "{}/users/{}?{}&key={}",
            self.base_url,
            uid,
            mask.join("&"),
            self.api_key
        );
        self.client
            .patch(&url)
            .json(&serde_json::json!({"fields": fields}))
            .send()
            .await
            .with_context(|| format!("updating preferences for {uid}"))?
            .error_for_status()
            .with_context(|| format!("updating preferences for {uid}"))?;
        Ok(())
    }
}

fn profile_from_document(doc: &Document) -> Option<UserProfile> {
    let uid = doc.name.rsplit('/').next()?.to_string();
    let fields = &doc.fields;
    let fcm_token = fields.get("fcmToken").and_then(FireValue::as_str)?.to_string();
    if fcm_token.is_empty() {
        return None;
    }
    let field_str = |name: &str| {
        fields
            .get(name)
            .and_then(FireValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(UserProfile {
        uid,
        name: field_str("name").unwrap_or_else(|| "Student".into()),
        fcm_token,
        college: field_str("college"),
        selected_courses: fields
            .get("selectedCourses")
            .map(FireValue::as_string_list)
            .unwrap_or_default(),
        year_type: field_str("yearType"),
        year: field_str("year"),
        branch: field_str("branch"),
        notifications_enabled: fields
            .get("notificationsEnabled")
            .and_then(FireValue::as_bool)
            .unwrap_or(true),
        notify_minutes_before: normalize_lead_minutes(
            fields.get("notifyMinutesBefore").and_then(FireValue::as_int),
        ),
    })
}

#[async_trait::async_trait]
impl RosterSource for FirestoreClient {
    async fn users_with_tokens(&self) -> anyhow::Result<Vec<UserProfile>> {
        // The list endpoint has no inequality filter; the token check happens
        // here after decoding.
        let documents = self.list_user_documents().await?;
        let users: Vec<UserProfile> = documents.iter().filter_map(profile_from_document).collect();
        tracing::info!("found {} users with push tokens", users.len());
        Ok(users)
    }
}
