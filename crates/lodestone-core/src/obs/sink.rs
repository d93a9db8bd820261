//! Metrics sink boundary.
//!
//! Core collection logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between lifecycle logic
//! and the global metrics state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    LazyLoad {
        role: &'a str,
        rows: u64,
    },
    QueuedAddition {
        role: &'a str,
    },
    FlushPlanned {
        role: &'a str,
        inserts: u64,
        updates: u64,
        deletes: u64,
        recreated: bool,
    },
    OrphansScheduled {
        role: &'a str,
        count: u64,
    },
    CacheHit {
        role: &'a str,
    },
    CacheMiss {
        role: &'a str,
    },
    CachePut {
        role: &'a str,
    },
    CachePutRejected {
        role: &'a str,
    },
    CacheEvict {
        role: &'a str,
    },
    SoftLockContended {
        role: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::LazyLoad { role, rows } => {
                metrics::with_state_mut(|m| {
                    m.ops.lazy_loads = m.ops.lazy_loads.saturating_add(1);
                    m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows);
                    let entry = m.roles.entry(role.to_string()).or_default();
                    entry.lazy_loads = entry.lazy_loads.saturating_add(1);
                    entry.rows_loaded = entry.rows_loaded.saturating_add(rows);
                });
            }
            MetricsEvent::QueuedAddition { role } => {
                metrics::with_state_mut(|m| {
                    m.ops.queued_additions = m.ops.queued_additions.saturating_add(1);
                    let entry = m.roles.entry(role.to_string()).or_default();
                    entry.queued_additions = entry.queued_additions.saturating_add(1);
                });
            }
            MetricsEvent::FlushPlanned {
                role,
                inserts,
                updates,
                deletes,
                recreated,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.flush_plans = m.ops.flush_plans.saturating_add(1);
                    m.ops.row_inserts = m.ops.row_inserts.saturating_add(inserts);
                    m.ops.row_updates = m.ops.row_updates.saturating_add(updates);
                    m.ops.row_deletes = m.ops.row_deletes.saturating_add(deletes);
                    if recreated {
                        m.ops.recreates = m.ops.recreates.saturating_add(1);
                    }
                    let entry = m.roles.entry(role.to_string()).or_default();
                    entry.flush_plans = entry.flush_plans.saturating_add(1);
                    entry.row_inserts = entry.row_inserts.saturating_add(inserts);
                    entry.row_updates = entry.row_updates.saturating_add(updates);
                    entry.row_deletes = entry.row_deletes.saturating_add(deletes);
                    if recreated {
                        entry.recreates = entry.recreates.saturating_add(1);
                    }
                });
            }
            MetricsEvent::OrphansScheduled { role, count } => {
                metrics::with_state_mut(|m| {
                    m.ops.orphans_scheduled = m.ops.orphans_scheduled.saturating_add(count);
                    let entry = m.roles.entry(role.to_string()).or_default();
                    entry.orphans_scheduled = entry.orphans_scheduled.saturating_add(count);
                });
            }
            MetricsEvent::CacheHit { .. } => {
                metrics::with_state_mut(|m| m.cache.hits = m.cache.hits.saturating_add(1));
            }
            MetricsEvent::CacheMiss { .. } => {
                metrics::with_state_mut(|m| m.cache.misses = m.cache.misses.saturating_add(1));
            }
            MetricsEvent::CachePut { .. } => {
                metrics::with_state_mut(|m| m.cache.puts = m.cache.puts.saturating_add(1));
            }
            MetricsEvent::CachePutRejected { .. } => {
                metrics::with_state_mut(|m| {
                    m.cache.put_rejections = m.cache.put_rejections.saturating_add(1);
                });
            }
            MetricsEvent::CacheEvict { .. } => {
                metrics::with_state_mut(|m| {
                    m.cache.evictions = m.cache.evictions.saturating_add(1);
                });
            }
            MetricsEvent::SoftLockContended { .. } => {
                metrics::with_state_mut(|m| {
                    m.cache.lock_contention = m.cache.lock_contention.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in
        //   `with_metrics_sink`, which always restores the previous pointer
        //   before returning, including unwind paths via its guard.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        // - Only a shared reference is materialized, matching the original
        //   shared borrow used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - The lifetime is erased to a raw pointer installed only for this
    //   dynamic scope; the guard restores the previous slot on all exits,
    //   including panic.
    // - `record` only dereferences synchronously and never persists it.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let previous = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink_ptr));
    let _guard = Guard(previous);

    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSink(Cell<u64>);

    impl MetricsSink for CountingSink {
        fn record(&self, _event: MetricsEvent<'_>) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn scoped_override_receives_events_and_restores() {
        let sink = CountingSink(Cell::new(0));
        with_metrics_sink(&sink, || {
            record(MetricsEvent::CacheHit { role: "r" });
            record(MetricsEvent::CacheMiss { role: "r" });
        });
        assert_eq!(sink.0.get(), 2);

        // outside the scope, events land in global state again
        metrics_reset_all();
        record(MetricsEvent::CacheHit { role: "r" });
        assert_eq!(sink.0.get(), 2);
        assert!(metrics_report().cache.hits >= 1);
    }
}
