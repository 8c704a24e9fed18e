//! Score Adapter - scaled features → reconstruction errors + outlier flags
//!
//! ## Adaptive threshold
//!
//! With baseline `T0` from training and batch median error `M`:
//! - `M > 2 * T0`: the live distribution has drifted from training, so the
//!   working threshold becomes the batch's own 85th percentile
//! - otherwise the working threshold is `T0`
//!
//! The result is returned as a value and passed to the classifier; the
//! configured baseline is never overwritten. As a consequence the same sample
//! can be flagged differently depending on the batch it arrives in.

use tracing::{debug, info};

use super::models::{ModelBundle, ModelError};
use crate::features::FeatureMatrix;
use crate::types::{BaseStats, ScoredSample, ThresholdMode, WorkingThreshold};

/// Median-to-baseline ratio above which the threshold adapts.
pub const ADAPTIVE_TRIGGER_RATIO: f64 = 2.0;

/// Percentile of the batch's errors used as the adapted threshold.
pub const ADAPTIVE_PERCENTILE: f64 = 85.0;

/// Detector output marking an outlier.
const OUTLIER: i8 = -1;
const INLIER: i8 = 1;

/// Raw model outputs for one batch, index-aligned with the feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBatch {
    pub reconstruction_errors: Vec<f64>,
    pub memberships: Vec<i8>,
}

impl ScoreBatch {
    pub fn outlier_flags(&self) -> Vec<bool> {
        self.memberships.iter().map(|&m| m == OUTLIER).collect()
    }

    pub fn outlier_count(&self) -> usize {
        self.memberships.iter().filter(|&&m| m == OUTLIER).count()
    }

    /// Join scores with the raw measurements of the same rows.
    pub fn scored_samples(&self, base: &BaseStats) -> Vec<ScoredSample> {
        self.reconstruction_errors
            .iter()
            .zip(&self.memberships)
            .zip(base.current.iter().zip(&base.temperature))
            .map(|((&error, &membership), (&current, &temperature))| ScoredSample {
                reconstruction_error: error,
                outlier_flag: membership == OUTLIER,
                raw_current: current,
                raw_temperature: temperature,
            })
            .collect()
    }
}

/// Runs the scaler and both pretrained models over a feature matrix.
pub struct ScoreAdapter<'a> {
    bundle: &'a ModelBundle,
}

impl<'a> ScoreAdapter<'a> {
    pub fn new(bundle: &'a ModelBundle) -> Self {
        Self { bundle }
    }

    pub fn score(&self, matrix: &FeatureMatrix) -> Result<ScoreBatch, ModelError> {
        let scaler = self.bundle.scaler();
        if let Some((row, got)) = matrix
            .rows()
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, w)| *w != scaler.n_features())
        {
            return Err(ModelError::RowWidth {
                model: "scaler".to_string(),
                row,
                expected: scaler.n_features(),
                got,
            });
        }
        let scaled = scaler.transform_batch(matrix.rows());

        let reconstruction_errors = self.reconstruction_errors(&scaled)?;
        let memberships = self.memberships(&scaled)?;

        debug!(
            rows = scaled.len(),
            min_error = reconstruction_errors.iter().copied().fold(f64::INFINITY, f64::min),
            max_error = reconstruction_errors.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            outliers = memberships.iter().filter(|&&m| m == OUTLIER).count(),
            "Scored batch"
        );

        Ok(ScoreBatch {
            reconstruction_errors,
            memberships,
        })
    }

    /// Mean squared difference between each scaled row and its reconstruction.
    fn reconstruction_errors(&self, scaled: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let model = self.bundle.reconstructor();
        let recon = model.reconstruct(scaled)?;
        if recon.len() != scaled.len() {
            return Err(ModelError::RowCount {
                model: model.name().to_string(),
                expected: scaled.len(),
                got: recon.len(),
            });
        }

        scaled
            .iter()
            .zip(&recon)
            .enumerate()
            .map(|(row, (input, output))| {
                if output.len() != input.len() {
                    return Err(ModelError::RowWidth {
                        model: model.name().to_string(),
                        row,
                        expected: input.len(),
                        got: output.len(),
                    });
                }
                let sum: f64 = input.iter().zip(output).map(|(x, r)| (x - r).powi(2)).sum();
                let mse = sum / input.len().max(1) as f64;
                if mse.is_finite() {
                    Ok(mse)
                } else {
                    Err(ModelError::NonFinite {
                        model: model.name().to_string(),
                        row,
                    })
                }
            })
            .collect()
    }

    fn memberships(&self, scaled: &[Vec<f64>]) -> Result<Vec<i8>, ModelError> {
        let model = self.bundle.detector();
        let memberships = model.predict(scaled)?;
        if memberships.len() != scaled.len() {
            return Err(ModelError::RowCount {
                model: model.name().to_string(),
                expected: scaled.len(),
                got: memberships.len(),
            });
        }
        if let Some((row, &value)) = memberships
            .iter()
            .enumerate()
            .find(|(_, &m)| m != OUTLIER && m != INLIER)
        {
            return Err(ModelError::InvalidMembership {
                model: model.name().to_string(),
                row,
                value,
            });
        }
        Ok(memberships)
    }
}

/// Working threshold for a batch of reconstruction errors.
pub fn adaptive_threshold(errors: &[f64], baseline: f64) -> WorkingThreshold {
    let keep = WorkingThreshold {
        value: baseline,
        baseline,
        mode: ThresholdMode::Baseline,
    };
    let Some(median) = percentile(errors, 50.0) else {
        return keep;
    };

    if median > baseline * ADAPTIVE_TRIGGER_RATIO {
        let value = percentile(errors, ADAPTIVE_PERCENTILE).unwrap_or(baseline);
        info!(
            median,
            baseline,
            threshold = value,
            "Median reconstruction error far above training threshold, using 85th percentile"
        );
        WorkingThreshold {
            value,
            baseline,
            mode: ThresholdMode::Adaptive { median },
        }
    } else {
        debug!(median, baseline, "Using training threshold");
        keep
    }
}

/// Percentile `p` (0-100) with linear interpolation between closest ranks.
///
/// `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::features::FeatureBuilder;
    use crate::ml_engine::models::{ModelArtifacts, OutlierDetector, Reconstructor, StandardScaler};
    use crate::types::CanonicalSample;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!(close(percentile(&values, 50.0).unwrap(), 2.5));
        assert!(close(percentile(&values, 85.0).unwrap(), 3.55));
        assert!(close(percentile(&values, 0.0).unwrap(), 1.0));
        assert!(close(percentile(&values, 100.0).unwrap(), 4.0));
        assert!(percentile(&[], 50.0).is_none());
    }

    #[test]
    fn test_adaptive_trigger_uses_85th_percentile() {
        // median 0.3 = 3 x baseline
        let errors = [0.1, 0.2, 0.3, 0.3, 0.3, 0.4, 0.5, 0.6, 2.0];
        let threshold = adaptive_threshold(&errors, 0.1);
        assert!(threshold.is_adaptive());
        assert!(close(threshold.value, 0.58));
        assert_eq!(threshold.baseline, 0.1);
        match threshold.mode {
            ThresholdMode::Adaptive { median } => assert!(close(median, 0.3)),
            ThresholdMode::Baseline => panic!("expected adaptive mode"),
        }
    }

    #[test]
    fn test_median_at_twice_baseline_keeps_baseline() {
        let errors = [0.1, 0.2, 0.2, 0.2, 0.9];
        let threshold = adaptive_threshold(&errors, 0.1);
        assert_eq!(threshold.mode, ThresholdMode::Baseline);
        assert_eq!(threshold.value, 0.1);
    }

    #[test]
    fn test_empty_errors_keep_baseline() {
        assert_eq!(adaptive_threshold(&[], 0.2).value, 0.2);
    }

    // ------------------------------------------------------------------
    // Adapter against stub models
    // ------------------------------------------------------------------

    enum Recon {
        Identity,
        Zeros,
        ShortBatch,
        Nan,
    }

    impl Reconstructor for Recon {
        fn reconstruct(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
            Ok(match self {
                Self::Identity => batch.to_vec(),
                Self::Zeros => batch.iter().map(|r| vec![0.0; r.len()]).collect(),
                Self::ShortBatch => batch[1..].to_vec(),
                Self::Nan => batch.iter().map(|r| vec![f64::NAN; r.len()]).collect(),
            })
        }
    }

    struct Memberships(Vec<i8>);

    impl OutlierDetector for Memberships {
        fn predict(&self, _batch: &[Vec<f64>]) -> Result<Vec<i8>, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn bundle(recon: Recon, memberships: Vec<i8>) -> ModelBundle {
        let artifacts = ModelArtifacts {
            config: ModelConfig::default(),
            feature_names: vec!["current".to_string(), "temperature".to_string()],
            scaler: StandardScaler::new(vec![10.0, 50.0], vec![1.0, 2.0]).unwrap(),
        };
        ModelBundle::new(artifacts, Box::new(recon), Box::new(Memberships(memberships))).unwrap()
    }

    fn matrix(bundle: &ModelBundle) -> (FeatureMatrix, BaseStats) {
        let samples = [
            CanonicalSample::new(1_770_811_200, 11.0, 52.0),
            CanonicalSample::new(1_770_811_260, 10.0, 50.0),
            CanonicalSample::new(1_770_811_320, 12.0, 46.0),
        ];
        FeatureBuilder::build(&samples, bundle.feature_names(), 5).unwrap()
    }

    #[test]
    fn test_identity_reconstruction_scores_zero() {
        let bundle = bundle(Recon::Identity, vec![1, -1, 1]);
        let (m, base) = matrix(&bundle);
        let batch = ScoreAdapter::new(&bundle).score(&m).unwrap();
        assert_eq!(batch.reconstruction_errors, vec![0.0, 0.0, 0.0]);
        assert_eq!(batch.outlier_flags(), vec![false, true, false]);
        assert_eq!(batch.outlier_count(), 1);

        let scored = batch.scored_samples(&base);
        assert_eq!(scored[1].raw_current, 10.0);
        assert!(scored[1].outlier_flag);
    }

    #[test]
    fn test_zero_reconstruction_is_mean_square_of_scaled_row() {
        let bundle = bundle(Recon::Zeros, vec![1, 1, 1]);
        let (m, _) = matrix(&bundle);
        let batch = ScoreAdapter::new(&bundle).score(&m).unwrap();
        // scaled rows: [1, 1], [0, 0], [2, -2]
        assert_eq!(batch.reconstruction_errors, vec![1.0, 0.0, 4.0]);
    }

    #[test]
    fn test_model_output_is_validated() {
        let short = bundle(Recon::ShortBatch, vec![1, 1, 1]);
        let (m, _) = matrix(&short);
        assert!(matches!(
            ScoreAdapter::new(&short).score(&m),
            Err(ModelError::RowCount { expected: 3, got: 2, .. })
        ));

        let nan = bundle(Recon::Nan, vec![1, 1, 1]);
        assert!(matches!(
            ScoreAdapter::new(&nan).score(&m),
            Err(ModelError::NonFinite { row: 0, .. })
        ));

        let bad_membership = bundle(Recon::Identity, vec![1, 0, 1]);
        assert!(matches!(
            ScoreAdapter::new(&bad_membership).score(&m),
            Err(ModelError::InvalidMembership { row: 1, value: 0, .. })
        ));
    }
}
