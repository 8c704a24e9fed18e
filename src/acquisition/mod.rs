//! Telemetry acquisition
//!
//! - [`payload`]: raw charge-point record → [`CanonicalSample`](crate::types::CanonicalSample)
//! - [`client`]: HTTP fetch of raw records from the charge-management API

pub mod client;
pub mod payload;

pub use client::{
    authorization_header, cms_time_lapsed_url, device_label, unwrap_records, with_limit,
    FetchError, TelemetryClient,
};
pub use payload::{extract, ExtractionFailure};
