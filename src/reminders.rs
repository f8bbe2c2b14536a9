//! The reminder engine: one pass decides, for every eligible user, which of
//! their subscribed class slots is about to start and sends the pushes that
//! have not been sent for this week's occurrence yet.

use std::collections::HashMap;

use anyhow::Context as _;
use serde::Serialize;

use crate::Context;
use crate::clock::{self, LocalParts};
use crate::dedup::OccurrenceId;
use crate::fcm::{Push, SendError};
use crate::roster::UserProfile;
use crate::timetable::{Slot, SubjectInfo, course_name};

/// Minutes of slack around the exact target instant. Absorbs the one-minute
/// polling granularity plus clock skew between tick execution and wall time.
const TOLERANCE_MINUTES: i64 = 1;

const DEEP_LINK: &str = "nextclass://home";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Eligible users considered.
    pub users: usize,
    /// Notifications delivered and cache-marked.
    pub sent: usize,
}

type CohortKey = (String, String, String, String);
type SlotCache = HashMap<String, HashMap<String, Slot>>;
type SubjectCache = HashMap<CohortKey, HashMap<String, SubjectInfo>>;

/// Runs one full pass at the given local time.
///
/// A failure for one user or one college is logged and isolated; only a
/// roster fetch failure aborts the pass. The eviction guard runs at the end
/// regardless of how many sends succeeded.
pub async fn run_pass(ctx: &Context, now: LocalParts) -> anyhow::Result<PassSummary> {
    tracing::info!(
        "checking for upcoming classes at {}:{:02} (weekday {})",
        now.minutes / 60,
        now.minutes % 60,
        now.weekday
    );

    let users = ctx
        .roster
        .users_with_tokens()
        .await
        .context("fetching notification roster")?;
    let users: Vec<UserProfile> = users.into_iter().filter(|u| u.is_eligible()).collect();

    let mut summary = PassSummary {
        users: users.len(),
        ..PassSummary::default()
    };

    // Slot and subject lookups are per college and per cohort; memoize them
    // so a pass hits each path once no matter how many users share it.
    let mut slot_cache = SlotCache::new();
    let mut subject_cache = SubjectCache::new();

    for user in &users {
        if let Err(e) = notify_user(
            ctx,
            now,
            user,
            &mut slot_cache,
            &mut subject_cache,
            &mut summary.sent,
        )
        .await
        {
            tracing::error!("skipping user {}: {:?}", user.uid, e);
        }
    }

    tracing::info!("sent {} notifications this pass", summary.sent);
    if ctx.sent.evict_if_full() {
        tracing::info!("cleared sent-notification cache");
    }
    Ok(summary)
}

async fn notify_user(
    ctx: &Context,
    now: LocalParts,
    user: &UserProfile,
    slot_cache: &mut SlotCache,
    subject_cache: &mut SubjectCache,
    sent: &mut usize,
) -> anyhow::Result<()> {
    let Some(college) = user.college.as_deref() else {
        return Ok(());
    };

    if !slot_cache.contains_key(college) {
        let slots = ctx
            .timetable
            .slots(college)
            .await
            .with_context(|| format!("fetching slots for {college}"))?;
        slot_cache.insert(college.to_string(), slots);
    }
    let slots = &slot_cache[college];
    if slots.is_empty() {
        return Ok(());
    }

    let subjects = cohort_subjects(ctx, user, college, subject_cache).await;
    let target = i64::from(now.minutes) + i64::from(user.notify_minutes_before);

    for (slot_key, slot) in slots {
        let course = course_name(&slot.event_name);
        if !user.selected_courses.iter().any(|c| c == course) {
            continue;
        }
        if !slot.recurrence_days.contains(now.weekday) {
            continue;
        }
        let start = i64::from(clock::parse_clock_minutes(&slot.start_time));
        if (start - target).abs() > TOLERANCE_MINUTES {
            continue;
        }

        let id = OccurrenceId {
            uid: user.uid.clone(),
            slot_key: slot_key.clone(),
            weekday: now.weekday,
            start_time: slot.start_time.clone(),
        };
        if ctx.sent.contains(&id) {
            tracing::debug!("already notified this week: {id:?}");
            continue;
        }

        let push = render_push(course, user.notify_minutes_before, slot, subjects.get(course));
        match ctx.notifier.send(&user.fcm_token, &push).await {
            Ok(()) => {
                // Mark only after a confirmed delivery; a failed send stays
                // retryable for as long as the firing window lasts.
                ctx.sent.insert(id);
                *sent += 1;
                tracing::info!("notified {} about {}", user.name, course);
            }
            Err(SendError::Unregistered) => {
                tracing::warn!("push token for {} is no longer registered", user.uid);
            }
            Err(SendError::Transient(e)) => {
                tracing::error!("push to {} failed: {:?}", user.uid, e);
            }
        }
    }
    Ok(())
}

/// Subject metadata only enriches the message; a missing cohort or a failed
/// lookup yields an empty map and delivery proceeds without it.
async fn cohort_subjects<'a>(
    ctx: &Context,
    user: &UserProfile,
    college: &str,
    subject_cache: &'a mut SubjectCache,
) -> &'a HashMap<String, SubjectInfo> {
    let cohort: CohortKey = (
        college.to_string(),
        user.year_type.clone().unwrap_or_default(),
        user.year.clone().unwrap_or_default(),
        user.branch.clone().unwrap_or_default(),
    );
    if !subject_cache.contains_key(&cohort) {
        let subjects = match (&user.year_type, &user.year, &user.branch) {
            (Some(year_type), Some(year), Some(branch)) => {
                match ctx.timetable.subjects(college, year_type, year, branch).await {
                    Ok(subjects) => subjects,
                    Err(e) => {
                        tracing::warn!("subject lookup failed for {college}: {e:?}");
                        HashMap::new()
                    }
                }
            }
            _ => HashMap::new(),
        };
        subject_cache.insert(cohort.clone(), subjects);
    }
    &subject_cache[&cohort]
}

fn render_push(course: &str, lead: u32, slot: &Slot, info: Option<&SubjectInfo>) -> Push {
    let full_name = info.map(|i| i.full_course_name.as_str()).unwrap_or("");
    let faculty = info.map(|i| i.faculty.as_str()).unwrap_or("");

    let mut parts: Vec<String> = Vec::new();
    if !full_name.is_empty() && full_name != course {
        parts.push(full_name.to_string());
    }
    if !slot.room_number.is_empty() {
        parts.push(format!("Room: {}", slot.room_number));
    }
    if !faculty.is_empty() {
        parts.push(format!("Prof: {faculty}"));
    }
    parts.push(format!("Starts at {}", slot.start_time));

    Push {
        title: format!("📚 {course} in {lead} minutes!"),
        body: parts.join(" • "),
        data: HashMap::from([
            ("type".to_string(), "class_reminder".to_string()),
            ("course".to_string(), course.to_string()),
            ("startTime".to_string(), slot.start_time.clone()),
            ("classroom".to_string(), slot.room_number.clone()),
            ("deep_link".to_string(), DEEP_LINK.to_string()),
        ]),
    }
}
