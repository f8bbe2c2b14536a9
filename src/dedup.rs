use std::collections::HashSet;
use std::sync::Mutex;

/// One weekly firing instance of a session slot for one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccurrenceId {
    pub uid: String,
    pub slot_key: String,
    pub weekday: u32,
    pub start_time: String,
}

/// Once the cache grows past this many occurrences it is cleared wholesale.
/// There is no per-entry expiry.
pub const EVICTION_THRESHOLD: usize = 10_000;

/// Process-lifetime set of occurrences already notified.
///
/// Volatile: state is lost on restart, so a reminder may be re-sent if the
/// process restarts inside a firing window. Likewise, a clear that lands
/// inside a still-open window can re-notify that occurrence; the window is
/// three minutes wide once a week, so the exposure is negligible but
/// nonzero.
pub struct SentCache {
    entries: Mutex<HashSet<OccurrenceId>>,
}

impl SentCache {
    pub fn new() -> SentCache {
        SentCache {
            entries: Mutex::new(HashSet::new()),
        }
    }

    pub fn contains(&self, id: &OccurrenceId) -> bool {
        self.lock().contains(id)
    }

    pub fn insert(&self, id: OccurrenceId) {
        self.lock().insert(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Unbounded-growth guard, run at the end of each pass. Returns whether
    /// the cache was cleared.
    pub fn evict_if_full(&self) -> bool {
        let mut entries = self.lock();
        if entries.len() > EVICTION_THRESHOLD {
            entries.clear();
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<OccurrenceId>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
