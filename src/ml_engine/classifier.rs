//! Anomaly Classifier - scored samples → severity tiers
//!
//! Only the reconstruction error decides whether a sample is anomalous
//! (`error > working threshold`). The outlier flag travels with the sample
//! for display but never gates classification.
//!
//! Anomalous samples are tiered on their raw measurements, highest first:
//! - `critical`: temperature or current at/above its `upper_critical`
//! - `high`: temperature or current at/above its `upper_warning`
//! - `medium`: everything else
//!
//! `low` is part of the taxonomy but not assigned by this policy.

use tracing::debug;

use crate::types::{ScoredSample, Severity, SeverityCount, SeverityThresholds, WorkingThreshold};

/// Per-sample severities and their per-tier counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub counts: SeverityCount,
    pub severities: Vec<Severity>,
}

pub struct AnomalyClassifier;

impl AnomalyClassifier {
    pub fn classify(
        samples: &[ScoredSample],
        threshold: &WorkingThreshold,
        bounds: &SeverityThresholds,
    ) -> Classification {
        let mut counts = SeverityCount::default();
        let severities: Vec<Severity> = samples
            .iter()
            .map(|sample| {
                let severity = Self::severity_of(sample, threshold.value, bounds);
                counts.record(severity);
                severity
            })
            .collect();

        debug!(
            threshold = threshold.value,
            critical = counts.critical,
            high = counts.high,
            medium = counts.medium,
            "Classified batch"
        );

        Classification { counts, severities }
    }

    /// Tier for one sample against a working threshold.
    pub fn severity_of(sample: &ScoredSample, threshold: f64, bounds: &SeverityThresholds) -> Severity {
        if sample.reconstruction_error <= threshold {
            return Severity::Normal;
        }

        let temp = sample.raw_temperature;
        let current = sample.raw_current;
        if temp >= bounds.temperature.upper_critical || current >= bounds.current.upper_critical {
            Severity::Critical
        } else if temp >= bounds.temperature.upper_warning || current >= bounds.current.upper_warning {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ThresholdMode, TierBounds};

    fn bounds() -> SeverityThresholds {
        SeverityThresholds {
            current: TierBounds {
                upper_warning: 32.0,
                upper_critical: 40.0,
            },
            temperature: TierBounds {
                upper_warning: 70.0,
                upper_critical: 80.0,
            },
        }
    }

    fn sample(error: f64, current: f64, temperature: f64, outlier: bool) -> ScoredSample {
        ScoredSample {
            reconstruction_error: error,
            outlier_flag: outlier,
            raw_current: current,
            raw_temperature: temperature,
        }
    }

    fn baseline(value: f64) -> WorkingThreshold {
        WorkingThreshold {
            value,
            baseline: value,
            mode: ThresholdMode::Baseline,
        }
    }

    #[test]
    fn test_tiers_and_counts() {
        let samples = [
            sample(0.1, 50.0, 90.0, true), // below threshold, normal despite raw values
            sample(0.5, 13.0, 50.0, false),
            sample(0.5, 35.0, 50.0, false),
            sample(0.5, 13.0, 72.0, false),
            sample(0.5, 13.0, 80.0, false),
            sample(0.5, 40.0, 20.0, false),
        ];
        let result = AnomalyClassifier::classify(&samples, &baseline(0.2), &bounds());
        assert_eq!(
            result.severities,
            vec![
                Severity::Normal,
                Severity::Medium,
                Severity::High,
                Severity::High,
                Severity::Critical,
                Severity::Critical,
            ]
        );
        assert_eq!(
            result.counts,
            SeverityCount {
                critical: 2,
                high: 2,
                medium: 1,
                low: 0
            }
        );
    }

    #[test]
    fn test_error_equal_to_threshold_is_normal() {
        let s = sample(0.2, 90.0, 90.0, false);
        assert_eq!(AnomalyClassifier::severity_of(&s, 0.2, &bounds()), Severity::Normal);
    }

    #[test]
    fn test_outlier_flag_does_not_gate() {
        let flagged = sample(0.1, 13.0, 50.0, true);
        let unflagged = sample(0.5, 13.0, 50.0, false);
        assert_eq!(AnomalyClassifier::severity_of(&flagged, 0.2, &bounds()), Severity::Normal);
        assert_eq!(AnomalyClassifier::severity_of(&unflagged, 0.2, &bounds()), Severity::Medium);
    }

    #[test]
    fn test_raising_temperature_never_lowers_tier() {
        for current in [0.0, 13.0, 35.0, 45.0] {
            let mut previous = Severity::Normal;
            for step in 0..=120 {
                let temperature = f64::from(step);
                let tier =
                    AnomalyClassifier::severity_of(&sample(1.0, current, temperature, false), 0.2, &bounds());
                assert!(tier >= previous, "tier dropped at {temperature} C, {current} A");
                previous = tier;
            }
            assert_eq!(previous, Severity::Critical);
        }
    }

    #[test]
    fn test_low_is_never_assigned() {
        let samples: Vec<_> = (0..50)
            .map(|i| sample(f64::from(i) / 10.0, f64::from(i), f64::from(i * 2), i % 2 == 0))
            .collect();
        let result = AnomalyClassifier::classify(&samples, &baseline(1.0), &bounds());
        assert_eq!(result.counts.low, 0);
        assert!(!result.severities.contains(&Severity::Low));
    }
}
