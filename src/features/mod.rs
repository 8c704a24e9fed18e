//! Feature engineering over canonical telemetry samples
//!
//! [`FeatureBuilder::build`] turns a batch of [`CanonicalSample`](crate::types::CanonicalSample)s
//! into the model's input matrix plus the raw measurements the severity
//! classifier needs. [`rolling`] holds the series primitives it is built on.

pub mod builder;
pub mod rolling;

pub use builder::{FeatureBuilder, FeatureError, FeatureMatrix, MIN_SAMPLES};
