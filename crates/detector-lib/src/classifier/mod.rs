//! Attack classification
//!
//! A fixed standardized-linear model scores each per-epoch feature vector;
//! strictly positive means malicious. Scoring is a pure function so every
//! verdict is reproducible from the logged features and the weights file.

mod model;

pub use model::{ClassifierModel, ModelError, WEIGHT_TOKENS};

use crate::models::FeatureVector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Features per attachment point per epoch
pub const FEATURE_COUNT: usize = 4;

/// Outcome of scoring one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub malicious: bool,
}

/// Scores feature vectors against an immutable model
#[derive(Debug, Clone)]
pub struct Classifier {
    model: ClassifierModel,
}

impl Classifier {
    pub fn new(model: ClassifierModel) -> Self {
        Self { model }
    }

    /// Standardize each feature and combine:
    /// `sum_i ((f_i - mean_i) / scale_i) * coefficient_i + intercept`.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        let values = features.as_array();
        let mut score = self.model.intercept;
        for i in 0..FEATURE_COUNT {
            score += (values[i] - self.model.mean[i]) / self.model.scale[i]
                * self.model.coefficients[i];
        }
        score
    }

    /// Malicious iff the score is strictly positive.
    pub fn classify(&self, features: &FeatureVector) -> Verdict {
        let score = self.score(features);
        Verdict {
            score,
            malicious: score > 0.0,
        }
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }
}

/// Runtime switch for verbose classifier output.
///
/// Shared between the engine and the HTTP control surface. Purely
/// observational: flipping it changes what gets logged per classification,
/// never the verdict.
#[derive(Debug, Clone, Default)]
pub struct DebugToggle {
    enabled: Arc<AtomicBool>,
}

impl DebugToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_model() -> ClassifierModel {
        ClassifierModel {
            scale: [1.0; FEATURE_COUNT],
            mean: [0.0; FEATURE_COUNT],
            coefficients: [1.0, 0.0, 0.0, 0.0],
            intercept: -5.0,
        }
    }

    fn features(live_flows: f64) -> FeatureVector {
        FeatureVector {
            live_flows,
            flow_rate: 100.0,
            mean_packet_delta: 100.0,
            stddev_packet_delta: 100.0,
        }
    }

    #[test]
    fn test_score_zero_is_not_malicious() {
        // Only the first coefficient is non-zero, so live_flows = 5 lands
        // exactly on the boundary.
        let classifier = Classifier::new(unit_model());
        let verdict = classifier.classify(&features(5.0));
        assert_eq!(verdict.score, 0.0);
        assert!(!verdict.malicious);
    }

    #[test]
    fn test_positive_score_is_malicious() {
        let classifier = Classifier::new(unit_model());
        let verdict = classifier.classify(&features(6.0));
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.malicious);
    }

    #[test]
    fn test_standardization_applies_per_feature() {
        let model = ClassifierModel {
            scale: [2.0, 4.0, 1.0, 1.0],
            mean: [10.0, 8.0, 0.0, 0.0],
            coefficients: [1.0, 2.0, 0.0, 0.0],
            intercept: 0.5,
        };
        let classifier = Classifier::new(model);
        let features = FeatureVector {
            live_flows: 14.0,
            flow_rate: 16.0,
            mean_packet_delta: 3.0,
            stddev_packet_delta: 9.0,
        };
        // (14-10)/2 * 1 + (16-8)/4 * 2 + 0.5 = 2 + 4 + 0.5
        assert!((classifier.score(&features) - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_debug_toggle_does_not_change_verdict() {
        let classifier = Classifier::new(unit_model());
        let toggle = DebugToggle::new();

        let before = classifier.classify(&features(6.0));
        toggle.set(true);
        let during = classifier.classify(&features(6.0));
        toggle.set(false);
        let after = classifier.classify(&features(6.0));

        assert_eq!(before, during);
        assert_eq!(during, after);
    }

    #[test]
    fn test_debug_toggle_shares_state_across_clones() {
        let toggle = DebugToggle::new();
        let clone = toggle.clone();

        clone.set(true);
        assert!(toggle.is_enabled());
        toggle.set(false);
        assert!(!clone.is_enabled());
    }
}
