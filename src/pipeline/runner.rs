//! End-to-end pipeline run

use std::time::Instant;

use polars::prelude::DataFrame;

use super::churn::{derive_churn_label, ChurnReport};
use super::config::PipelineConfig;
use super::delta::{generate_delta_features, DeltaFeatureSpec};
use super::encoding::{encode_splits, TargetEncodingMap};
use super::high_value::{filter_high_value, HighValueCutoff};
use super::missing::{impute_missing, ImputeReport};
use super::outliers::{cap_outliers, CapBounds};
use super::schema::FeatureTable;
use super::split::{stratified_split, SplitReport};
use crate::error::{Result, Stage};
use crate::report::PipelineSummary;

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub train: FeatureTable,
    pub test: FeatureTable,
    pub encoding: TargetEncodingMap,
    pub cap_bounds: CapBounds,
    pub cutoff: HighValueCutoff,
    pub impute: ImputeReport,
    pub churn: ChurnReport,
    pub split: SplitReport,
    pub summary: PipelineSummary,
}

/// Run every stage over a raw table.
///
/// Order: classify, impute, filter high-value subscribers, label churn, add
/// delta features, cap outliers, split, then learn and apply the target
/// encoding from the training split.
pub fn run_pipeline(raw: DataFrame, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;

    let mut summary = PipelineSummary::new(raw.height(), raw.width());

    let start = Instant::now();
    let table = FeatureTable::from_raw(raw);
    summary.record(Stage::SchemaClassifier, &table, start.elapsed());

    let start = Instant::now();
    let (table, impute) = impute_missing(&table, config.missing_threshold, &config.impute)?;
    summary.record(Stage::MissingnessImputer, &table, start.elapsed());

    let start = Instant::now();
    let (table, cutoff) = filter_high_value(&table, config.high_value_quantile)?;
    summary.record(Stage::HighValueFilter, &table, start.elapsed());

    let start = Instant::now();
    let (table, churn) = derive_churn_label(&table)?;
    summary.record(Stage::ChurnLabel, &table, start.elapsed());

    let start = Instant::now();
    let table = generate_delta_features(&table, &DeltaFeatureSpec::defaults())?;
    summary.record(Stage::DeltaFeatures, &table, start.elapsed());

    let start = Instant::now();
    let (table, cap_bounds) = cap_outliers(&table, config.cap_k)?;
    summary.record(Stage::OutlierCapper, &table, start.elapsed());

    let start = Instant::now();
    let (train, test, split) = stratified_split(&table, config.test_fraction, config.seed)?;
    summary.record(Stage::StratifiedSplit, &table, start.elapsed());

    let start = Instant::now();
    let (train, test, encoding) = encode_splits(&train, &test)?;
    summary.record(Stage::TargetEncoder, &train, start.elapsed());

    summary.set_imputation(&impute);
    summary.set_churn(&churn);
    summary.set_split(&split);

    Ok(PipelineOutput {
        train,
        test,
        encoding,
        cap_bounds,
        cutoff,
        impute,
        churn,
        split,
        summary,
    })
}
