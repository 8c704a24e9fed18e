//! Reporting: the canonical gauge mapping and report sinks
//!
//! Image rendering and object-storage upload live outside this crate; they
//! consume an [`InferenceReport`](crate::types::InferenceReport) through a
//! [`ReportSink`].

pub mod gauge;
pub mod sink;

pub use gauge::{GaugeReading, GaugeZone, GAUGE_MAX, ZONE_TICKS};
pub use sink::{LocalReportSink, ReportError, ReportSink};
