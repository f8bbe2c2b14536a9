use serde::{Deserialize, Serialize};

use crate::errors::UserError;
use crate::roster::DEFAULT_LEAD_MINUTES;

/// The two knobs a user controls about reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub notifications_enabled: bool,
    pub notify_minutes_before: u32,
}

impl Default for Preferences {
    fn default() -> Preferences {
        Preferences {
            notifications_enabled: true,
            notify_minutes_before: DEFAULT_LEAD_MINUTES,
        }
    }
}

/// Partial update with merge semantics: unspecified fields are preserved.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub notifications_enabled: Option<bool>,
    pub notify_minutes_before: Option<i64>,
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.notifications_enabled.is_none() && self.notify_minutes_before.is_none()
    }

    /// Writes reject an out-of-range lead time outright; nothing is stored.
    /// Only the read path coerces legacy junk to the default.
    pub fn validate(&self) -> Result<(), UserError> {
        match self.notify_minutes_before {
            Some(lead) if !(1..=60).contains(&lead) => Err(UserError(
                "notifyMinutesBefore must be between 1 and 60".into(),
            )),
            _ => Ok(()),
        }
    }
}
