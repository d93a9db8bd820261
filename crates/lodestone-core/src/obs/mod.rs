//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Engine logic does not log directly; every instrumentation point flows
//! through [`sink::MetricsEvent`] and a [`sink::MetricsSink`].

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{CacheOps, EventOps, EventReport, EventState, RoleCounters};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
