//! Pipeline configuration constants

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result, Stage};

/// Default fraction of missing values at which a column is dropped
pub const DEFAULT_MISSING_THRESHOLD: f64 = 0.7;

/// Default percentile of the average recharge amount a subscriber must reach
pub const DEFAULT_HIGH_VALUE_QUANTILE: f64 = 0.7;

/// Default width of the capping band in standard deviations
pub const DEFAULT_CAP_K: f64 = 3.0;

/// Default held-out fraction
pub const DEFAULT_TEST_FRACTION: f64 = 0.8;

/// Default split seed
pub const DEFAULT_SEED: u64 = 4;

/// Settings for the chained-equation imputer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputeConfig {
    /// Number of completed tables averaged into the final values
    pub draws: usize,
    /// Maximum burn-in sweeps before the draws are taken
    pub max_iterations: usize,
    /// Burn-in stops once the largest relative change of a sweep drops below this
    pub tolerance: f64,
    /// Ridge penalty, relative to the number of observed rows
    pub ridge: f64,
    /// Add residual noise to each draw instead of using the conditional mean
    pub posterior_sampling: bool,
    /// Seed for posterior draws
    pub seed: u64,
}

impl Default for ImputeConfig {
    fn default() -> Self {
        Self {
            draws: 1,
            max_iterations: 10,
            tolerance: 1e-3,
            ridge: 1e-3,
            posterior_sampling: false,
            seed: 0,
        }
    }
}

/// Configuration for a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Columns whose missing fraction reaches this value are dropped
    pub missing_threshold: f64,
    /// Percentile (0..1) of the average recharge that defines a high-value subscriber
    pub high_value_quantile: f64,
    /// Capping band half-width in standard deviations
    pub cap_k: f64,
    /// Fraction of subscribers held out for testing
    pub test_fraction: f64,
    /// Seed for the stratified split
    pub seed: u64,
    pub impute: ImputeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
            high_value_quantile: DEFAULT_HIGH_VALUE_QUANTILE,
            cap_k: DEFAULT_CAP_K,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            impute: ImputeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check every constant against its valid range, reporting the stage that uses it.
    pub fn validate(&self) -> Result<()> {
        fn invalid(stage: Stage, message: String) -> Result<()> {
            Err(PipelineError::InvalidConfig { stage, message })
        }

        if !(self.missing_threshold > 0.0 && self.missing_threshold <= 1.0) {
            return invalid(
                Stage::MissingnessImputer,
                format!(
                    "missing threshold must be in (0, 1], got {}",
                    self.missing_threshold
                ),
            );
        }
        if self.impute.draws == 0 {
            return invalid(
                Stage::MissingnessImputer,
                "imputation needs at least one draw".to_string(),
            );
        }
        if self.impute.max_iterations == 0 {
            return invalid(
                Stage::MissingnessImputer,
                "imputation needs at least one sweep".to_string(),
            );
        }
        if !(self.impute.tolerance.is_finite() && self.impute.tolerance >= 0.0) {
            return invalid(
                Stage::MissingnessImputer,
                format!("tolerance must be non-negative, got {}", self.impute.tolerance),
            );
        }
        if !(self.impute.ridge.is_finite() && self.impute.ridge > 0.0) {
            return invalid(
                Stage::MissingnessImputer,
                format!("ridge penalty must be positive, got {}", self.impute.ridge),
            );
        }
        if !(0.0..=1.0).contains(&self.high_value_quantile) {
            return invalid(
                Stage::HighValueFilter,
                format!(
                    "quantile must be in [0, 1], got {}",
                    self.high_value_quantile
                ),
            );
        }
        if !(self.cap_k.is_finite() && self.cap_k > 0.0) {
            return invalid(
                Stage::OutlierCapper,
                format!("k must be positive, got {}", self.cap_k),
            );
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return invalid(
                Stage::StratifiedSplit,
                format!(
                    "test fraction must be in (0, 1), got {}",
                    self.test_fraction
                ),
            );
        }
        Ok(())
    }
}
