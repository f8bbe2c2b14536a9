//! Firebase Realtime Database REST client backing the timetable source.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::timetable::{Slot, SubjectInfo, TimetableSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RtdbClient {
    client: reqwest::Client,
    base_url: String,
}

impl RtdbClient {
    pub fn new(base_url: &str) -> anyhow::Result<RtdbClient> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid realtime database url {base_url:?}"))?;
        Ok(RtdbClient {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("building realtime database http client")?,
            base_url: base.to_string().trim_end_matches('/').to_string(),
        })
    }

    /// The database answers `null` for any path with no data; that decodes
    /// to `None` here and callers turn it into an empty map.
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Option<T>> {
        let url = format!("{}/{path}.json", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching {path}"))?
            .error_for_status()
            .with_context(|| format!("fetching {path}"))?
            .json()
            .await
            .with_context(|| format!("decoding {path}"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSubject {
    course_name: String,
    faculty: String,
    full_course_name: String,
}

#[async_trait::async_trait]
impl TimetableSource for RtdbClient {
    async fn slots(&self, college: &str) -> anyhow::Result<HashMap<String, Slot>> {
        let raw: Option<HashMap<String, serde_json::Value>> =
            self.fetch(&format!("colleges/{college}/slots")).await?;
        let mut slots = HashMap::new();
        for (key, value) in raw.unwrap_or_default() {
            if !value.is_object() {
                continue;
            }
            match serde_json::from_value::<Slot>(value) {
                Ok(slot) => {
                    slots.insert(key, slot);
                }
                Err(e) => tracing::debug!("skipping undecodable slot {key} in {college}: {e}"),
            }
        }
        Ok(slots)
    }

    async fn subjects(
        &self,
        college: &str,
        year_type: &str,
        year: &str,
        branch: &str,
    ) -> anyhow::Result<HashMap<String, SubjectInfo>> {
        let path = format!("colleges/{college}/{year_type}/{year}/branches/{branch}/subjects");
        let raw: Option<HashMap<String, serde_json::Value>> = self.fetch(&path).await?;
        let mut subjects = HashMap::new();
        for (key, value) in raw.unwrap_or_default() {
            if !value.is_object() {
                continue;
            }
            let Ok(subject) = serde_json::from_value::<RawSubject>(value) else {
                continue;
            };
            // Subjects are keyed by their short course name, falling back to
            // the node key for older records.
            let course = if subject.course_name.is_empty() {
                key
            } else {
                subject.course_name
            };
            subjects.insert(
                course,
                SubjectInfo {
                    faculty: subject.faculty,
                    full_course_name: subject.full_course_name,
                },
            );
        }
        Ok(subjects)
    }
}
