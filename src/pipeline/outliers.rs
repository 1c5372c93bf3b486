//! k-sigma outlier capping for numeric features

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use super::frame::{float_values, with_replaced};
use super::schema::FeatureTable;
use crate::error::{Result, Stage};

const STAGE: Stage = Stage::OutlierCapper;

/// Clipping band for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnBounds {
    pub column: String,
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ColumnBounds {
    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// Mean and sample standard deviation (ddof = 1) of the non-null values.
///
/// Fewer than two values give a zero deviation.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

/// Per-column capping bands learned from one table.
#[derive(Debug, Clone, Serialize)]
pub struct CapBounds {
    pub k: f64,
    pub columns: Vec<ColumnBounds>,
}

impl CapBounds {
    /// Learn `[mean - k*std, mean + k*std]` for every numeric feature
    pub fn fit(table: &FeatureTable, k: f64) -> Result<Self> {
        let df = table.frame();
        let columns = table
            .schema()
            .numeric_features()
            .par_iter()
            .map(|name| {
                let values: Vec<f64> = float_values(df, name, STAGE)?.into_iter().flatten().collect();
                let (mean, std) = mean_and_std(&values);
                // std == 0 collapses the band onto the mean, which every value already equals
                Ok(ColumnBounds {
                    column: name.clone(),
                    mean,
                    std,
                    lower: mean - k * std,
                    upper: mean + k * std,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { k, columns })
    }

    /// Clip every bounded column. Applying the same bounds again changes nothing.
    pub fn apply(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let df = table.frame();
        let clipped: Vec<Column> = self
            .columns
            .par_iter()
            .map(|bounds| {
                let values: Vec<Option<f64>> = float_values(df, &bounds.column, STAGE)?
                    .into_iter()
                    .map(|v| v.map(|x| bounds.clip(x)))
                    .collect();
                Ok(Column::new(bounds.column.as_str().into(), values))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = df.clone();
        for column in clipped {
            out = with_replaced(&out, column, STAGE)?;
        }

        tracing::info!(columns = self.columns.len(), k = self.k, "capped outliers");
        Ok(FeatureTable::with_schema(out, table.schema().clone()))
    }
}

/// Fit bounds on `table` and clip it
pub fn cap_outliers(table: &FeatureTable, k: f64) -> Result<(FeatureTable, CapBounds)> {
    let bounds = CapBounds::fit(table, k)?;
    let capped = bounds.apply(table)?;
    Ok((capped, bounds))
}
