use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Context;
use crate::clock;
use crate::reminders::{self, PassSummary};

/// How often the engine checks for upcoming classes.
pub const TICK_CADENCE: Duration = Duration::from_secs(60);

/// Drives the reminder engine on a fixed cadence.
///
/// Passes never overlap: the timer loop and manual triggering share one pass
/// guard, and a tick that lands while a pass is still running waits for it
/// (`MissedTickBehavior::Delay`).
pub struct Scheduler {
    ctx: Arc<Context>,
    pass_guard: Arc<Mutex<()>>,
    running: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<Context>) -> Scheduler {
        Scheduler {
            ctx,
            pass_guard: Arc::new(Mutex::new(())),
            running: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
        }
    }

    /// Spawns the timer loop. Idempotent: a second start while running is a
    /// no-op.
    pub async fn start(&self) {
        let mut handle = self.loop_handle.lock().await;
        if handle.is_some() {
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        let pass_guard = Arc::clone(&self.pass_guard);
        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_CADENCE);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let _pass = pass_guard.lock().await;
                let now = clock::now_parts(ctx.timezone);
                if let Err(e) = reminders::run_pass(&ctx, now).await {
                    tracing::error!("reminder pass failed: {e:?}");
                }
            }
        }));
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "notification scheduler started, checking every {}s",
            TICK_CADENCE.as_secs()
        );
    }

    /// Stops the timer loop. Idempotent and safe to call when not running.
    /// Waits for an in-flight pass to finish rather than cancelling it.
    pub async fn stop(&self) {
        let mut handle = self.loop_handle.lock().await;
        if let Some(handle) = handle.take() {
            let _pass = self.pass_guard.lock().await;
            handle.abort();
            tracing::info!("notification scheduler stopped");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs one pass now, regardless of timer state. Diagnostics entry
    /// point; the shared guard keeps it serial with the timer loop.
    pub async fn run_once(&self) -> anyhow::Result<PassSummary> {
        let _pass = self.pass_guard.lock().await;
        let now = clock::now_parts(self.ctx.timezone);
        reminders::run_pass(&self.ctx, now).await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
