//! Pipeline error types
//!
//! Every error names the stage where it was detected. A failing stage aborts
//! the whole run; no partial output is produced.

use std::fmt;

use polars::prelude::PolarsError;
use serde::Serialize;
use thiserror::Error;

/// The pipeline stage that produced a value or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    SchemaClassifier,
    MissingnessImputer,
    HighValueFilter,
    ChurnLabel,
    DeltaFeatures,
    OutlierCapper,
    StratifiedSplit,
    TargetEncoder,
}

impl Stage {
    /// Human-readable stage title used in logs and summaries
    pub fn title(&self) -> &'static str {
        match self {
            Stage::SchemaClassifier => "Schema Classifier",
            Stage::MissingnessImputer => "Missingness Imputer",
            Stage::HighValueFilter => "High-Value Filter",
            Stage::ChurnLabel => "Churn Label",
            Stage::DeltaFeatures => "Delta Features",
            Stage::OutlierCapper => "Outlier Capper",
            Stage::StratifiedSplit => "Stratified Split",
            Stage::TargetEncoder => "Target Encoder",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Errors raised by the feature-engineering stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Required columns are absent from the table
    #[error("{stage}: missing required column(s): {}", .columns.join(", "))]
    MissingColumns { stage: Stage, columns: Vec<String> },

    /// A column that must hold numbers has some other dtype
    #[error("{stage}: column '{column}' must be numeric, found {dtype}")]
    NonNumericColumn {
        stage: Stage,
        column: String,
        dtype: String,
    },

    /// A derived column would collide with an existing or repeated name
    #[error("{stage}: duplicate column '{column}'")]
    DuplicateColumn { stage: Stage, column: String },

    /// A configuration constant is out of range
    #[error("{stage}: invalid configuration: {message}")]
    InvalidConfig { stage: Stage, message: String },

    /// The stage received a table without rows
    #[error("{stage}: input table has zero rows")]
    EmptyInput { stage: Stage },

    /// Multivariate imputation could not produce a completed value
    #[error("{stage}: imputation of column '{column}' failed: {reason}")]
    ImputationConvergence {
        stage: Stage,
        column: String,
        reason: String,
    },

    /// A filter left nothing to work with
    #[error("{stage}: {what} left zero rows")]
    EmptyResult { stage: Stage, what: String },

    /// A label class is too small to appear in both partitions
    #[error(
        "{stage}: class {class} has {members} member(s), too few to stratify at test fraction {test_fraction}"
    )]
    Stratification {
        stage: Stage,
        class: i32,
        members: usize,
        test_fraction: f64,
    },

    /// A category reached the encoder that the training split never showed
    #[error("{stage}: category '{value}' in column '{column}' was not seen in the training split")]
    UnseenCategory {
        stage: Stage,
        column: String,
        value: String,
    },

    /// Underlying dataframe failure
    #[error("{stage}: {source}")]
    Polars {
        stage: Stage,
        #[source]
        source: PolarsError,
    },
}

impl PipelineError {
    /// Stage where the error was detected
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MissingColumns { stage, .. }
            | PipelineError::NonNumericColumn { stage, .. }
            | PipelineError::DuplicateColumn { stage, .. }
            | PipelineError::InvalidConfig { stage, .. }
            | PipelineError::EmptyInput { stage }
            | PipelineError::ImputationConvergence { stage, .. }
            | PipelineError::EmptyResult { stage, .. }
            | PipelineError::Stratification { stage, .. }
            | PipelineError::UnseenCategory { stage, .. }
            | PipelineError::Polars { stage, .. } => *stage,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attach a stage to a polars result
pub trait StageContext<T> {
    fn at(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for std::result::Result<T, PolarsError> {
    fn at(self, stage: Stage) -> Result<T> {
        self.map_err(|source| PipelineError::Polars { stage, source })
    }
}
