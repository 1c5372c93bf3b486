//! Cross-month delta features
//!
//! For each metric, `metric_diff = metric_8 - (metric_6 + metric_7) / 2`:
//! the change in the last behaviour month against the two months before it.

use std::collections::HashSet;

use polars::prelude::*;
use serde::Serialize;

use super::frame::{dense_values, require_columns, with_replaced};
use super::schema::{ColumnKind, FeatureTable, Month};
use crate::error::{PipelineError, Result, Stage};

const STAGE: Stage = Stage::DeltaFeatures;

/// Metrics that get a delta feature by default
pub const DEFAULT_DELTA_METRICS: [&str; 23] = [
    "arpu",
    "onnet_mou",
    "offnet_mou",
    "roam_ic_mou",
    "roam_og_mou",
    "loc_og_mou",
    "std_og_mou",
    "isd_og_mou",
    "spl_og_mou",
    "total_og_mou",
    "loc_ic_mou",
    "std_ic_mou",
    "isd_ic_mou",
    "spl_ic_mou",
    "total_ic_mou",
    "total_rech_num",
    "total_rech_amt",
    "max_rech_amt",
    "total_rech_data",
    "max_rech_data",
    "av_rech_amt_data",
    "vol_2g_mb",
    "vol_3g_mb",
];

/// A metric observed in the three behaviour months
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaFeatureSpec {
    pub metric: String,
}

impl DeltaFeatureSpec {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
        }
    }

    /// Baseline months followed by the comparison month
    pub fn sources(&self) -> [String; 3] {
        let [first, second, third] = Month::BEHAVIOUR;
        [
            first.column(&self.metric),
            second.column(&self.metric),
            third.column(&self.metric),
        ]
    }

    pub fn output(&self) -> String {
        format!("{}_diff", self.metric)
    }

    /// The default metric list
    pub fn defaults() -> Vec<DeltaFeatureSpec> {
        DEFAULT_DELTA_METRICS.iter().map(|m| Self::new(*m)).collect()
    }
}

/// Month-3 value minus the mean of months 1 and 2
pub fn delta(first: f64, second: f64, third: f64) -> f64 {
    third - (first + second) / 2.0
}

/// Append one `_diff` column per spec. Source columns are kept.
pub fn generate_delta_features(
    table: &FeatureTable,
    specs: &[DeltaFeatureSpec],
) -> Result<FeatureTable> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.metric.as_str()) {
            return Err(PipelineError::DuplicateColumn {
                stage: STAGE,
                column: spec.output(),
            });
        }
        if table.schema().get(&spec.output()).is_some() {
            return Err(PipelineError::DuplicateColumn {
                stage: STAGE,
                column: spec.output(),
            });
        }
    }

    let required: Vec<String> = specs.iter().flat_map(|s| s.sources()).collect();
    require_columns(table.frame(), &required, STAGE)?;

    let mut df = table.frame().clone();
    let mut schema = table.schema().clone();
    for spec in specs {
        let [first, second, third] = spec.sources();
        let first = dense_values(&df, &first, STAGE)?;
        let second = dense_values(&df, &second, STAGE)?;
        let third = dense_values(&df, &third, STAGE)?;

        let diffs: Vec<f64> = (0..df.height())
            .map(|i| delta(first[i], second[i], third[i]))
            .collect();
        let name = spec.output();
        df = with_replaced(&df, Column::new(name.as_str().into(), diffs), STAGE)?;
        schema = schema.with_column(&name, ColumnKind::Numeric);
    }

    tracing::info!(added = specs.len(), columns = df.width(), "generated delta features");
    Ok(FeatureTable::with_schema(df, schema))
}
