//! Feature Builder - canonical samples → fixed-order feature matrix
//!
//! Derives the per-sample feature frame the pretrained models were fitted on,
//! then selects the columns named by the artifact's feature-name list, in
//! that order.
//!
//! ## Derived columns
//!
//! | Column | Definition |
//! |---|---|
//! | `ts`, `current`, `temperature` | sorted samples, current clipped at 0 |
//! | `delta_t` | forward difference of `ts` (s); 0 → undefined |
//! | `{m}_diff`, `{m}_diff_abs` | first difference and its magnitude |
//! | `{m}_pct_change` | `x[i] / x[i-1] - 1`, non-finite → 0 |
//! | `{m}_roll_mean/std/min/max` | adaptive window, min_periods = 1, std NaN → 0 |
//! | `{m}_deviation` | `|x - roll_mean|` |
//! | `{m}_rate` | `diff / delta_t` |
//! | `{m}_volatility` | FIXED-window std / adaptive roll_mean (0 mean → undefined) |
//! | `hour`, `minute`, `day_of_week`, `is_weekend`, `hour_sin`, `hour_cos` | UTC calendar |
//!
//! `{m}` is `current` or `temperature`. Undefined values left in a selected
//! column are filled with 0.
//!
//! The adaptive window is `max(2, min(roll_win, n / 3))`: short batches get a
//! narrower window than the configured one, which changes rolling values
//! relative to a fixed window. Volatility deliberately keeps the configured
//! window with `min_periods = roll_win`, so it stays 0 until the batch holds
//! `roll_win` samples. Models were fitted on exactly this asymmetry.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::{debug, warn};

use super::rolling::{
    diff, finite_or_zero, pct_change, rolling_max, rolling_mean, rolling_min, rolling_std,
    safe_ratio,
};
use crate::types::{BaseStats, CanonicalSample};

/// Minimum number of usable samples for a batch.
pub const MIN_SAMPLES: usize = 3;

/// Smallest adaptive rolling window.
const MIN_ROLL_WIN: usize = 2;

const MEASUREMENTS: [&str; 2] = ["current", "temperature"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("Not enough data points to compute features: got {got}, need at least {required}")]
    InsufficientData { got: usize, required: usize },

    #[error("Missing required features: {0:?}")]
    MissingFeatures(Vec<String>),
}

// ============================================================================
// Feature Matrix
// ============================================================================

/// Row-major matrix, one row per sample, columns in feature-name order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.feature_names.len()
    }

    /// Copy of one named column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.feature_names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Feature builder. Stateless; every call starts from its inputs.
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Build the feature matrix and the aligned raw measurements.
    ///
    /// Samples with a non-finite current or temperature are dropped first.
    /// Duplicate timestamps are kept.
    pub fn build(
        samples: &[CanonicalSample],
        feature_names: &[String],
        roll_win: usize,
    ) -> Result<(FeatureMatrix, BaseStats), FeatureError> {
        let mut usable: Vec<CanonicalSample> =
            samples.iter().copied().filter(CanonicalSample::is_finite).collect();
        let dropped = samples.len() - usable.len();
        if dropped > 0 {
            warn!(dropped, "Dropped samples with non-finite measurements");
        }
        if usable.len() < MIN_SAMPLES {
            return Err(FeatureError::InsufficientData {
                got: usable.len(),
                required: MIN_SAMPLES,
            });
        }

        // Stable: equal timestamps keep arrival order
        usable.sort_by_key(|s| s.timestamp);

        let base = BaseStats {
            timestamps: usable.iter().map(|s| s.timestamp).collect(),
            current: usable.iter().map(|s| s.current.max(0.0)).collect(),
            temperature: usable.iter().map(|s| s.temperature).collect(),
        };

        let roll_win = roll_win.max(1);
        let window = Self::effective_window(base.len(), roll_win);
        let frame = Self::derive(&base, window, roll_win);

        let missing: Vec<String> = feature_names
            .iter()
            .filter(|name| !frame.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingFeatures(missing));
        }

        let columns: Vec<&Vec<f64>> = feature_names
            .iter()
            .filter_map(|name| frame.get(name.as_str()))
            .collect();
        let rows: Vec<Vec<f64>> = (0..base.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| if col[i].is_finite() { col[i] } else { 0.0 })
                    .collect()
            })
            .collect();

        debug!(
            samples = base.len(),
            features = feature_names.len(),
            window,
            roll_win,
            "Built feature matrix"
        );

        Ok((
            FeatureMatrix {
                feature_names: feature_names.to_vec(),
                rows,
            },
            base,
        ))
    }

    /// `max(2, min(roll_win, n / 3))`
    pub fn effective_window(n_samples: usize, roll_win: usize) -> usize {
        MIN_ROLL_WIN.max(roll_win.min(n_samples / 3))
    }

    /// Every derivable column, keyed by name.
    fn derive(base: &BaseStats, window: usize, roll_win: usize) -> HashMap<String, Vec<f64>> {
        let mut frame: HashMap<String, Vec<f64>> = HashMap::new();

        let ts: Vec<f64> = base.timestamps.iter().map(|&t| t as f64).collect();
        let delta_t: Vec<f64> = diff(&ts)
            .into_iter()
            .map(|d| if d == 0.0 { f64::NAN } else { d })
            .collect();

        for (name, values) in MEASUREMENTS.iter().zip([&base.current, &base.temperature]) {
            let step = diff(values);
            let mut pct = pct_change(values);
            finite_or_zero(&mut pct);

            let roll_mean = rolling_mean(values, window, 1);
            let mut roll_std = rolling_std(values, window, 1);
            for v in roll_std.iter_mut().filter(|v| v.is_nan()) {
                *v = 0.0;
            }
            let deviation: Vec<f64> = values
                .iter()
                .zip(&roll_mean)
                .map(|(x, m)| (x - m).abs())
                .collect();
            let rate: Vec<f64> = step.iter().zip(&delta_t).map(|(d, dt)| d / dt).collect();
            let volatility = safe_ratio(&rolling_std(values, roll_win, roll_win), &roll_mean);

            frame.insert(format!("{name}_diff_abs"), step.iter().map(|d| d.abs()).collect());
            frame.insert(format!("{name}_diff"), step);
            frame.insert(format!("{name}_pct_change"), pct);
            frame.insert(format!("{name}_roll_min"), rolling_min(values, window, 1));
            frame.insert(format!("{name}_roll_max"), rolling_max(values, window, 1));
            frame.insert(format!("{name}_roll_mean"), roll_mean);
            frame.insert(format!("{name}_roll_std"), roll_std);
            frame.insert(format!("{name}_deviation"), deviation);
            frame.insert(format!("{name}_rate"), rate);
            frame.insert(format!("{name}_volatility"), volatility);
            frame.insert((*name).to_string(), values.clone());
        }

        let calendar: Vec<Option<DateTime<Utc>>> = base
            .timestamps
            .iter()
            .map(|&t| DateTime::from_timestamp(t, 0))
            .collect();
        let field = |f: fn(&DateTime<Utc>) -> f64| -> Vec<f64> {
            calendar.iter().map(|dt| dt.as_ref().map_or(f64::NAN, f)).collect()
        };
        let hour = field(|dt| f64::from(dt.hour()));
        let day_of_week = field(|dt| f64::from(dt.weekday().num_days_from_monday()));

        frame.insert("minute".to_string(), field(|dt| f64::from(dt.minute())));
        frame.insert(
            "is_weekend".to_string(),
            day_of_week.iter().map(|&d| if d >= 5.0 { 1.0 } else { 0.0 }).collect(),
        );
        frame.insert(
            "hour_sin".to_string(),
            hour.iter().map(|h| (2.0 * PI * h / 24.0).sin()).collect(),
        );
        frame.insert(
            "hour_cos".to_string(),
            hour.iter().map(|h| (2.0 * PI * h / 24.0).cos()).collect(),
        );
        frame.insert("hour".to_string(), hour);
        frame.insert("day_of_week".to_string(), day_of_week);
        frame.insert("delta_t".to_string(), delta_t);
        frame.insert("ts".to_string(), ts);

        frame
    }
}
