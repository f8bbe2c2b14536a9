use chrono::{Datelike, Timelike, Utc};
use chrono_tz::Tz;

/// The current instant reduced to what the matching algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalParts {
    /// Minutes since midnight, local to the configured timezone.
    pub minutes: u32,
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: u32,
}

pub fn now_parts(tz: Tz) -> LocalParts {
    let now = Utc::now().with_timezone(&tz);
    LocalParts {
        minutes: now.hour() * 60 + now.minute(),
        weekday: now.weekday().number_from_monday(),
    }
}

/// Parses an "H:MM" / "HH:MM" class start time to minutes since midnight.
///
/// Timetables store afternoon times without a 24-hour encoding; classes run
/// from 8am, so an hour below 8 is an afternoon time and gets shifted by 12
/// ("02:15" means 14:15).
///
/// Malformed input maps to 0 so one bad slot can never take down a pass; the
/// slot simply fails every time check.
pub fn parse_clock_minutes(text: &str) -> u32 {
    let mut parts = text.split(':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return 0;
    };
    let (Ok(mut hours), Ok(minutes)) = (h.trim().parse::<u32>(), m.trim().parse::<u32>()) else {
        return 0;
    };
    if hours < 8 {
        hours += 12;
    }
    hours * 60 + minutes
}
