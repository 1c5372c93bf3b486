//! Pipeline run report export

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::summary::StageRecord;
use crate::pipeline::{
    CapBounds, ChurnReport, HighValueCutoff, ImputeReport, PipelineConfig, PipelineOutput,
    SplitReport, TargetEncodingMap,
};

/// Metadata about the run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub churnprep_version: String,
    pub input_file: String,
    pub train_file: String,
    pub test_file: String,
}

/// Columns removed by the pipeline, grouped by reason
#[derive(Serialize)]
pub struct DroppedColumns {
    pub identifier_and_date: Vec<String>,
    pub high_missing: Vec<String>,
    pub outcome_month: Vec<String>,
}

/// Complete run report
#[derive(Serialize)]
pub struct PipelineReport<'a> {
    pub metadata: RunMetadata,
    pub config: &'a PipelineConfig,
    pub stages: &'a [StageRecord],
    pub dropped_columns: DroppedColumns,
    pub imputation: &'a ImputeReport,
    pub high_value: &'a HighValueCutoff,
    pub churn: &'a ChurnReport,
    pub churn_rate: f64,
    pub cap_bounds: &'a CapBounds,
    pub target_encoding: &'a TargetEncodingMap,
    pub split: &'a SplitReport,
}

/// Paths recorded in the report metadata
pub struct ReportPaths<'a> {
    pub input: &'a Path,
    pub train: &'a Path,
    pub test: &'a Path,
}

impl<'a> PipelineReport<'a> {
    pub fn new(output: &'a PipelineOutput, config: &'a PipelineConfig, paths: &ReportPaths) -> Self {
        Self {
            metadata: RunMetadata {
                timestamp: Utc::now().to_rfc3339(),
                churnprep_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: paths.input.display().to_string(),
                train_file: paths.train.display().to_string(),
                test_file: paths.test.display().to_string(),
            },
            config,
            stages: &output.summary.stages,
            dropped_columns: DroppedColumns {
                identifier_and_date: output.impute.dropped_id_date.clone(),
                high_missing: output.impute.dropped_sparse.clone(),
                outcome_month: output.churn.dropped_outcome_columns.clone(),
            },
            imputation: &output.impute,
            high_value: &output.cutoff,
            churn: &output.churn,
            churn_rate: output.churn.churn_rate(),
            cap_bounds: &output.cap_bounds,
            target_encoding: &output.encoding,
            split: &output.split,
        }
    }
}

/// Write the run report as pretty-printed JSON
pub fn export_report(
    output: &PipelineOutput,
    config: &PipelineConfig,
    paths: &ReportPaths,
    report_path: &Path,
) -> Result<()> {
    let report = PipelineReport::new(output, config, paths);

    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize pipeline report to JSON")?;

    std::fs::write(report_path, json).with_context(|| {
        format!("Failed to write pipeline report to {}", report_path.display())
    })?;

    tracing::debug!(path = %report_path.display(), "wrote pipeline report");
    Ok(())
}
