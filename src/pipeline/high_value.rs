//! High-value subscriber filter
//!
//! A subscriber's average recharge over the first two months is
//! `(call_amt + data_count * data_avg_value)` averaged over June and July.
//! Only subscribers at or above a percentile of that average are kept.

use polars::prelude::*;
use serde::Serialize;

use super::frame::{dense_values, require_columns};
use super::schema::{FeatureTable, Month};
use crate::error::{PipelineError, Result, Stage, StageContext};

const STAGE: Stage = Stage::HighValueFilter;

/// Call recharge amount per month
pub const CALL_RECHARGE_AMOUNT: &str = "total_rech_amt";
/// Number of data recharges per month
pub const DATA_RECHARGE_COUNT: &str = "total_rech_data";
/// Average data recharge value per month
pub const DATA_RECHARGE_AVG: &str = "av_rech_amt_data";

/// Months averaged to measure recharge value
pub const RECHARGE_MONTHS: [Month; 2] = [Month::June, Month::July];

/// Column names the filter reads
pub fn required_columns() -> Vec<String> {
    RECHARGE_MONTHS
        .iter()
        .flat_map(|m| {
            [CALL_RECHARGE_AMOUNT, DATA_RECHARGE_COUNT, DATA_RECHARGE_AVG]
                .into_iter()
                .map(move |base| m.column(base))
        })
        .collect()
}

/// Average recharge across the recharge months, one value per row
pub fn average_recharge(table: &FeatureTable) -> Result<Vec<f64>> {
    let df = table.frame();
    require_columns(df, &required_columns(), STAGE)?;

    let mut totals = vec![0.0; df.height()];
    for month in RECHARGE_MONTHS {
        let call = dense_values(df, &month.column(CALL_RECHARGE_AMOUNT), STAGE)?;
        let count = dense_values(df, &month.column(DATA_RECHARGE_COUNT), STAGE)?;
        let avg = dense_values(df, &month.column(DATA_RECHARGE_AVG), STAGE)?;
        for (i, total) in totals.iter_mut().enumerate() {
            *total += call[i] + count[i] * avg[i];
        }
    }

    let months = RECHARGE_MONTHS.len() as f64;
    Ok(totals.into_iter().map(|t| t / months).collect())
}

/// Quantile with linear interpolation between order statistics.
///
/// `q` is in `[0, 1]`; returns `None` for an empty slice.
pub fn linear_quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Recharge cutoff learned from one table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighValueCutoff {
    pub quantile: f64,
    pub cutoff: f64,
}

impl HighValueCutoff {
    /// Compute the cutoff as the `quantile` of the average recharge
    pub fn fit(table: &FeatureTable, quantile: f64) -> Result<Self> {
        let averages = average_recharge(table)?;
        let cutoff =
            linear_quantile(&averages, quantile).ok_or(PipelineError::EmptyInput { stage: STAGE })?;
        Ok(Self { quantile, cutoff })
    }

    /// Keep rows whose average recharge is at or above the cutoff.
    ///
    /// Row order and every input column are preserved; the intermediate
    /// amounts never enter the table.
    pub fn apply(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let averages = average_recharge(table)?;
        let keep: Vec<bool> = averages.iter().map(|&avg| avg >= self.cutoff).collect();
        let mask = BooleanChunked::from_slice("high_value".into(), &keep);

        let df = table.frame().filter(&mask).at(STAGE)?;
        if df.height() == 0 {
            return Err(PipelineError::EmptyResult {
                stage: STAGE,
                what: format!("recharge cutoff {:.2}", self.cutoff),
            });
        }

        tracing::info!(
            cutoff = self.cutoff,
            kept = df.height(),
            dropped = table.height() - df.height(),
            "filtered high-value subscribers"
        );
        Ok(FeatureTable::with_schema(df, table.schema().clone()))
    }
}

/// Fit the cutoff on `table` and keep its high-value rows
pub fn filter_high_value(table: &FeatureTable, quantile: f64) -> Result<(FeatureTable, HighValueCutoff)> {
    let cutoff = HighValueCutoff::fit(table, quantile)?;
    let filtered = cutoff.apply(table)?;
    Ok((filtered, cutoff))
}
