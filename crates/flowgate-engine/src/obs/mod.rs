//! Lightweight in-process metrics (dependency-free).
//!
//! Metrics are stored as atomics keyed by label sets and rendered in the
//! Prometheus text exposition format. [`metrics::MetricsHook`] feeds them from
//! flow lifecycle events.

pub mod metrics;

pub use metrics::{FlowMetrics, MetricsHook};
