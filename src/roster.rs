/// Lead time applied when a profile carries none, or an invalid one.
pub const DEFAULT_LEAD_MINUTES: u32 = 10;

/// Snapshot of one user's notification profile.
///
/// The engine reads a fresh snapshot each pass and never writes back.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub fcm_token: String,
    pub college: Option<String>,
    pub selected_courses: Vec<String>,
    // Cohort descriptors, used only to key the subject lookup.
    pub year_type: Option<String>,
    pub year: Option<String>,
    pub branch: Option<String>,
    pub notifications_enabled: bool,
    /// Already normalized into [1, 60].
    pub notify_minutes_before: u32,
}

impl UserProfile {
    /// A profile is eligible when it has a device token, at least one
    /// subscribed course, and notifications not explicitly disabled.
    pub fn is_eligible(&self) -> bool {
        !self.fcm_token.is_empty() && !self.selected_courses.is_empty() && self.notifications_enabled
    }
}

/// Forces a raw lead-time value into [1, 60], substituting the default for
/// anything missing or out of range. Non-numeric input becomes `None` at the
/// decoding layer and lands here too.
pub fn normalize_lead_minutes(raw: Option<i64>) -> u32 {
    match raw {
        Some(n) if (1..=60).contains(&n) => n as u32,
        _ => DEFAULT_LEAD_MINUTES,
    }
}

/// Yields the users that are candidates for notification: everyone with a
/// non-empty device token. The engine filters further on subscriptions and
/// the enabled flag.
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync {
    async fn users_with_tokens(&self) -> anyhow::Result<Vec<UserProfile>>;
}
