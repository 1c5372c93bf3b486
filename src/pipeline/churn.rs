//! Churn label derivation
//!
//! A subscriber churned when they made no calls and used no data in the
//! outcome month. The outcome month is then removed so none of it can leak
//! into the features.

use polars::prelude::*;
use serde::Serialize;

use super::frame::{dense_values, require_columns, with_replaced};
use super::schema::{FeatureTable, Month, LABEL_COLUMN};
use crate::error::{Result, Stage};

const STAGE: Stage = Stage::ChurnLabel;

/// Incoming and outgoing minutes of usage
pub const CALL_USAGE_BASES: [&str; 2] = ["total_ic_mou", "total_og_mou"];

/// 2G and 3G data volume
pub const DATA_USAGE_BASES: [&str; 2] = ["vol_2g_mb", "vol_3g_mb"];

/// Label outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct ChurnReport {
    pub churned: usize,
    pub retained: usize,
    pub dropped_outcome_columns: Vec<String>,
}

impl ChurnReport {
    pub fn churn_rate(&self) -> f64 {
        let total = self.churned + self.retained;
        if total == 0 {
            0.0
        } else {
            self.churned as f64 / total as f64
        }
    }
}

/// 1 when both usage totals are exactly zero, otherwise 0
pub fn churn_flag(total_calls: f64, total_data: f64) -> i32 {
    i32::from(total_calls == 0.0 && total_data == 0.0)
}

fn month_total(df: &DataFrame, bases: &[&str], month: Month) -> Result<Vec<f64>> {
    let mut totals = vec![0.0; df.height()];
    for base in bases {
        let values = dense_values(df, &month.column(base), STAGE)?;
        for (total, v) in totals.iter_mut().zip(values) {
            *total += v;
        }
    }
    Ok(totals)
}

/// Add the `churn` label and drop every outcome-month column.
pub fn derive_churn_label(table: &FeatureTable) -> Result<(FeatureTable, ChurnReport)> {
    let df = table.frame();
    let outcome = Month::OUTCOME;
    let required: Vec<String> = CALL_USAGE_BASES
        .iter()
        .chain(DATA_USAGE_BASES.iter())
        .map(|base| outcome.column(base))
        .collect();
    require_columns(df, &required, STAGE)?;

    let calls = month_total(df, &CALL_USAGE_BASES, outcome)?;
    let data = month_total(df, &DATA_USAGE_BASES, outcome)?;
    let labels: Vec<i32> = calls
        .iter()
        .zip(data.iter())
        .map(|(&c, &d)| churn_flag(c, d))
        .collect();
    let churned = labels.iter().filter(|&&l| l == 1).count();

    let with_label = with_replaced(df, Column::new(LABEL_COLUMN.into(), labels), STAGE)?;
    let outcome_columns = table.schema().month_columns(outcome);
    let df = with_label.drop_many(&outcome_columns);
    let schema = table
        .schema()
        .without(&outcome_columns)
        .with_label(LABEL_COLUMN);

    tracing::info!(
        churned,
        rows = df.height(),
        dropped = outcome_columns.len(),
        "derived churn label"
    );

    let report = ChurnReport {
        churned,
        retained: df.height() - churned,
        dropped_outcome_columns: outcome_columns,
    };
    Ok((FeatureTable::with_schema(df, schema), report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_truth_table() {
        assert_eq!(churn_flag(0.0, 0.0), 1);
        assert_eq!(churn_flag(0.0, 0.5), 0);
        assert_eq!(churn_flag(12.0, 0.0), 0);
        assert_eq!(churn_flag(12.0, 0.5), 0);
    }

    #[test]
    fn test_churn_rate() {
        let report = ChurnReport {
            churned: 1,
            retained: 3,
            dropped_outcome_columns: vec![],
        };
        assert_eq!(report.churn_rate(), 0.25);
    }
}
