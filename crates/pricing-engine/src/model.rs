//! The numeric pricing model invoked as a capability: a fixed-order,
//! ten-feature vector in, a scalar price out.

/// Feature order fixed by spec §4.6. Every [`PricingModel`] implementation
/// receives features in exactly this order.
pub const FEATURE_COUNT: usize = 10;

/// A deterministic scalar-prediction capability. Implementations never
/// perform I/O directly; a remote-inference implementation would wrap its
/// own network call and surface failures through [`ModelError`].
pub trait PricingModel: Send + Sync {
    /// Predicts a daily price from the fixed ten-float feature vector.
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError>;

    /// A stable identifier for the model version in use, attached to every
    /// decision record for later audit.
    fn version(&self) -> &str;
}

/// A model invocation failed.
#[derive(Debug, thiserror::Error)]
#[error("pricing model error: {0}")]
pub struct ModelError(pub String);

/// A simple linear model: `price = base_daily_rate * weighted_adjustment`,
/// the ten feature weights summed and clamped to a plausible multiplier
/// range. Stands in for a real trained regressor behind the same contract.
pub struct LinearPricingModel {
    weights: [f64; FEATURE_COUNT],
    version: String,
}

impl LinearPricingModel {
    /// Weights chosen so the bias term (feature index 9, always `1.0`)
    /// contributes nothing and every other feature nudges the base rate by
    /// a small, bounded fraction.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            weights: [0.0, 0.01, 0.0, 1.0, 0.001, -0.002, -0.003, 0.25, 0.30, 0.0],
            version: version.into(),
        }
    }
}

impl Default for LinearPricingModel {
    fn default() -> Self {
        Self::new("linear-v1")
    }
}

impl PricingModel for LinearPricingModel {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        let dot: f64 = features.iter().zip(self.weights.iter()).map(|(f, w)| f * w).sum();
        if !dot.is_finite() {
            return Err(ModelError("model produced a non-finite prediction".to_string()));
        }
        Ok(dot.max(0.0))
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// A model double that always errors, used to exercise the per-vehicle
/// fallback path in tests.
pub struct FailingPricingModel;

impl PricingModel for FailingPricingModel {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Result<f64, ModelError> {
        Err(ModelError("model unavailable".to_string()))
    }

    fn version(&self) -> &str {
        "failing-v0"
    }
}
