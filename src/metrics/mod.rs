//! Metrics instrumentation
//!
//! Recorded through the `metrics` facade. No exporter is installed by this
//! crate; applications choose one (Prometheus, statsd, ...) and every call
//! here is a no-op until they do.

pub mod counters;
pub mod histograms;
pub mod labels;
