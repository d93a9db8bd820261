use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Metrics
/// Ephemeral, in-memory counters for collection lifecycle operations.
/// Shared across sessions, so state lives behind a process-wide lock.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub cache: CacheOps,
    pub roles: BTreeMap<String, RoleCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    pub lazy_loads: u64,
    pub rows_loaded: u64,
    pub queued_additions: u64,
    pub flush_plans: u64,
    pub recreates: u64,
    pub row_inserts: u64,
    pub row_updates: u64,
    pub row_deletes: u64,
    pub orphans_scheduled: u64,
}

///
/// CacheOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CacheOps {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub put_rejections: u64,
    pub evictions: u64,
    pub lock_contention: u64,
}

///
/// RoleCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RoleCounters {
    pub lazy_loads: u64,
    pub rows_loaded: u64,
    pub queued_additions: u64,
    pub flush_plans: u64,
    pub recreates: u64,
    pub row_inserts: u64,
    pub row_updates: u64,
    pub row_deletes: u64,
    pub orphans_scheduled: u64,
}

///
/// EventReport
/// Point-in-time snapshot for endpoint/test plumbing.
///

pub type EventReport = EventState;

static EVENT_STATE: Mutex<Option<EventState>> = Mutex::new(None);

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    let mut guard = EVENT_STATE.lock();
    f(guard.get_or_insert_with(EventState::default))
}

/// Snapshot the current metrics state.
#[must_use]
pub(crate) fn report() -> EventReport {
    with_state_mut(|m| m.clone())
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}
