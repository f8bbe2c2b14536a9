//! Engine-level tests: the full reminder pass driven through in-memory
//! roster, timetable, and notifier fixtures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use classbot::Context;
use classbot::clock::LocalParts;
use classbot::dedup::SentCache;
use classbot::fcm::{Notifier, Push, SendError};
use classbot::reminders;
use classbot::roster::{RosterSource, UserProfile};
use classbot::scheduler::Scheduler;
use classbot::timetable::{RecurrenceDays, Slot, SubjectInfo, TimetableSource};

struct FixedRoster(Vec<UserProfile>);

#[async_trait]
impl RosterSource for FixedRoster {
    async fn users_with_tokens(&self) -> anyhow::Result<Vec<UserProfile>> {
        Ok(self.0.clone())
    }
}

struct FixedTimetable {
    slots: HashMap<String, Slot>,
    subjects: HashMap<String, SubjectInfo>,
}

#[async_trait]
impl TimetableSource for FixedTimetable {
    async fn slots(&self, college: &str) -> anyhow::Result<HashMap<String, Slot>> {
        if college == "broken" {
            anyhow::bail!("timetable store unavailable");
        }
        Ok(self.slots.clone())
    }

    async fn subjects(
        &self,
        _college: &str,
        _year_type: &str,
        _year: &str,
        _branch: &str,
    ) -> anyhow::Result<HashMap<String, SubjectInfo>> {
        Ok(self.subjects.clone())
    }
}

#[derive(Clone, Copy)]
enum Script {
    Deliver,
    Transient,
    Unregistered,
}

/// Notifier fixture: plays back a script of outcomes, then delivers.
#[derive(Default)]
struct ScriptedNotifier {
    script: Mutex<VecDeque<Script>>,
    delivered: Mutex<Vec<(String, Push)>>,
    attempts: AtomicUsize,
}

impl ScriptedNotifier {
    fn scripted(outcomes: &[Script]) -> Arc<ScriptedNotifier> {
        let notifier = ScriptedNotifier::default();
        notifier.script.lock().unwrap().extend(outcomes.iter().copied());
        Arc::new(notifier)
    }

    fn delivered(&self) -> Vec<(String, Push)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    async fn send(&self, token: &str, push: &Push) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Deliver);
        match outcome {
            Script::Deliver => {
                self.delivered
                    .lock()
                    .unwrap()
                    .push((token.to_string(), push.clone()));
                Ok(())
            }
            Script::Transient => Err(SendError::Transient(anyhow::anyhow!("provider timeout"))),
            Script::Unregistered => Err(SendError::Unregistered),
        }
    }
}

fn student(lead: u32) -> UserProfile {
    UserProfile {
        uid: "u-1".into(),
        name: "Asha".into(),
        fcm_token: "tok-1".into(),
        college: Some("nit-x".into()),
        selected_courses: vec!["CS101".into()],
        year_type: Some("ug".into()),
        year: Some("2".into()),
        branch: Some("cse".into()),
        notifications_enabled: true,
        notify_minutes_before: lead,
    }
}

fn cs101_slot() -> HashMap<String, Slot> {
    HashMap::from([(
        "slot-1".to_string(),
        Slot {
            event_name: "CS101 - Lecture".into(),
            recurrence_days: RecurrenceDays::List(vec![3]),
            start_time: "10:00".into(),
            room_number: "B-204".into(),
        },
    )])
}

fn wednesday(minutes: u32) -> LocalParts {
    LocalParts {
        minutes,
        weekday: 3,
    }
}

fn make_ctx(
    users: Vec<UserProfile>,
    slots: HashMap<String, Slot>,
    subjects: HashMap<String, SubjectInfo>,
    notifier: Arc<ScriptedNotifier>,
) -> Context {
    Context {
        roster: Arc::new(FixedRoster(users)),
        timetable: Arc::new(FixedTimetable { slots, subjects }),
        notifier,
        sent: SentCache::new(),
        timezone: chrono_tz::Asia::Kolkata,
    }
}

#[tokio::test]
async fn fires_within_lead_time_and_renders_the_message() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let subjects = HashMap::from([(
        "CS101".to_string(),
        SubjectInfo {
            faculty: "Dr. Rao".into(),
            full_course_name: "Computer Science 101".into(),
        },
    )]);
    let ctx = make_ctx(vec![student(10)], cs101_slot(), subjects, notifier.clone());

    // Wednesday 09:50, class at 10:00, lead 10.
    let summary = reminders::run_pass(&ctx, wednesday(9 * 60 + 50)).await.unwrap();

    assert_eq!(summary.users, 1);
    assert_eq!(summary.sent, 1);
    let delivered = notifier.delivered();
    assert_eq!(delivered.len(), 1);
    let (token, push) = &delivered[0];
    assert_eq!(token, "tok-1");
    assert!(push.title.contains("CS101"));
    assert!(push.title.contains("10 minutes"));
    assert_eq!(
        push.body,
        "Computer Science 101 • Room: B-204 • Prof: Dr. Rao • Starts at 10:00"
    );
    assert_eq!(push.data["course"], "CS101");
    assert_eq!(push.data["startTime"], "10:00");
}

#[tokio::test]
async fn same_occurrence_is_not_sent_twice_within_the_window() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let ctx = make_ctx(vec![student(10)], cs101_slot(), HashMap::new(), notifier.clone());

    let first = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();
    // One minute later, still inside the ±1 window.
    let second = reminders::run_pass(&ctx, wednesday(591)).await.unwrap();

    assert_eq!(first.sent, 1);
    assert_eq!(second.sent, 0);
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn wrong_weekday_does_not_fire() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let ctx = make_ctx(vec![student(10)], cs101_slot(), HashMap::new(), notifier.clone());

    let summary = reminders::run_pass(
        &ctx,
        LocalParts {
            minutes: 590,
            weekday: 4,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.sent, 0);
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn firing_window_is_exactly_one_minute_either_side() {
    // Class at 10:00 (600), lead 10: only 589, 590 and 591 may fire.
    let mut fired = Vec::new();
    for now in 0..(24 * 60) {
        let notifier = ScriptedNotifier::scripted(&[]);
        let ctx = make_ctx(vec![student(10)], cs101_slot(), HashMap::new(), notifier);
        let summary = reminders::run_pass(&ctx, wednesday(now)).await.unwrap();
        if summary.sent > 0 {
            fired.push(now);
        }
    }
    assert_eq!(fired, vec![589, 590, 591]);
}

#[tokio::test]
async fn unsubscribed_courses_and_empty_timetables_yield_nothing() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let mut other = student(10);
    other.selected_courses = vec!["EE201".into()];
    let ctx = make_ctx(vec![other], cs101_slot(), HashMap::new(), notifier.clone());
    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();
    assert_eq!(summary.sent, 0);

    let ctx = make_ctx(vec![student(10)], HashMap::new(), HashMap::new(), notifier.clone());
    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();
    assert_eq!(summary.sent, 0);
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn disabled_users_are_not_considered() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let mut muted = student(10);
    muted.notifications_enabled = false;
    let ctx = make_ctx(vec![muted], cs101_slot(), HashMap::new(), notifier.clone());

    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();

    assert_eq!(summary.users, 0);
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn failed_send_is_not_marked_and_retries_next_tick() {
    let notifier = ScriptedNotifier::scripted(&[Script::Transient]);
    let ctx = make_ctx(vec![student(10)], cs101_slot(), HashMap::new(), notifier.clone());

    let first = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();
    assert_eq!(first.sent, 0);
    assert!(ctx.sent.is_empty());

    // Next tick, still within the window: the same occurrence is retried.
    let second = reminders::run_pass(&ctx, wednesday(591)).await.unwrap();
    assert_eq!(second.sent, 1);
    assert_eq!(notifier.delivered().len(), 1);
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unregistered_token_is_logged_not_marked() {
    let notifier = ScriptedNotifier::scripted(&[Script::Unregistered]);
    let ctx = make_ctx(vec![student(10)], cs101_slot(), HashMap::new(), notifier.clone());

    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();

    assert_eq!(summary.sent, 0);
    assert!(ctx.sent.is_empty());
}

#[tokio::test]
async fn map_shaped_recurrence_still_matches() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let mut slots = cs101_slot();
    slots.get_mut("slot-1").unwrap().recurrence_days =
        RecurrenceDays::Map(HashMap::from([("0".to_string(), 3)]));
    let ctx = make_ctx(vec![student(10)], slots, HashMap::new(), notifier.clone());

    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();

    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn one_broken_college_does_not_abort_the_pass() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let mut stranded = student(10);
    stranded.uid = "u-2".into();
    stranded.college = Some("broken".into());
    let ctx = make_ctx(
        vec![stranded, student(10)],
        cs101_slot(),
        HashMap::new(),
        notifier.clone(),
    );

    let summary = reminders::run_pass(&ctx, wednesday(590)).await.unwrap();

    assert_eq!(summary.users, 2);
    assert_eq!(summary.sent, 1);
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test]
async fn lead_time_is_per_user() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let mut eager = student(30);
    eager.uid = "u-2".into();
    eager.fcm_token = "tok-2".into();
    let ctx = make_ctx(
        vec![student(10), eager],
        cs101_slot(),
        HashMap::new(),
        notifier.clone(),
    );

    // 09:30: only the 30-minute lead matches a 10:00 class.
    let summary = reminders::run_pass(&ctx, wednesday(9 * 60 + 30)).await.unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(notifier.delivered()[0].0, "tok-2");
}

#[tokio::test]
async fn scheduler_start_stop_and_trigger() {
    let notifier = ScriptedNotifier::scripted(&[]);
    let ctx = Arc::new(make_ctx(
        vec![student(10)],
        cs101_slot(),
        HashMap::new(),
        notifier,
    ));
    let scheduler = Scheduler::new(ctx);

    assert!(!scheduler.is_running());
    // Manual trigger works with the timer stopped.
    scheduler.run_once().await.unwrap();

    scheduler.start().await;
    assert!(scheduler.is_running());
    // Idempotent start.
    scheduler.start().await;
    assert!(scheduler.is_running());

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    // Stop is safe when not running.
    scheduler.stop().await;
    assert!(!scheduler.is_running());
}
