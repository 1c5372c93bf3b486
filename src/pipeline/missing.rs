//! Missing value analysis and imputation
//!
//! Imputation runs in ordered passes: zero-fill recharge columns, drop
//! identifier and date columns, fill categoricals with a sentinel category,
//! drop columns that are mostly missing, then complete the remaining numeric
//! columns jointly with chained-equation regression.

use polars::prelude::*;
use serde::Serialize;

use super::config::ImputeConfig;
use super::frame::{category_keys, float_values, with_replaced};
use super::mice::impute_chained;
use super::schema::{ColumnKind, FeatureTable, Month, SENTINEL_CATEGORY, SENTINEL_KEY};
use crate::error::{PipelineError, Result, Stage, StageContext};

const STAGE: Stage = Stage::MissingnessImputer;

/// Recharge columns where a missing value means "no recharge happened"
pub const ZERO_IMPUTE_BASES: [&str; 3] = ["total_rech_data", "av_rech_amt_data", "max_rech_data"];

/// Recharge value columns paired with the date of that recharge
pub const RECHARGE_PAIRS: [(&str, &str); 1] = [("total_rech_data", "date_of_last_rech_data")];

/// What the imputer did, for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImputeReport {
    pub zero_filled: Vec<String>,
    pub dropped_id_date: Vec<String>,
    pub sentinel_filled: Vec<String>,
    pub dropped_sparse: Vec<String>,
    pub imputed: Vec<String>,
    pub sweeps: usize,
    pub converged: bool,
}

/// Analyze missing values in the dataset.
///
/// Returns `(column, missing_fraction)` pairs sorted by fraction, highest first.
pub fn analyze_missing_values(df: &DataFrame) -> Vec<(String, f64)> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Vec::new();
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    // Sort by missing ratio descending
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    missing_ratios
}

/// Columns to drop: those whose missing fraction is at or above the threshold.
pub fn get_features_at_or_above_threshold(
    missing_ratios: &[(String, f64)],
    threshold: f64,
) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(_, ratio)| *ratio >= threshold)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Pass 1: replace missing recharge counts/amounts with zero.
pub fn zero_impute(table: &FeatureTable) -> Result<(FeatureTable, Vec<String>)> {
    warn_on_unpaired_recharges(table.frame());

    let mut df = table.frame().clone();
    let mut filled = Vec::new();

    for base in ZERO_IMPUTE_BASES {
        for month in Month::ALL {
            let name = month.column(base);
            if df.column(&name).is_err() {
                continue;
            }
            let values: Vec<f64> = float_values(&df, &name, STAGE)?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            df = with_replaced(&df, Column::new(name.as_str().into(), values), STAGE)?;
            filled.push(name);
        }
    }

    tracing::debug!(columns = filled.len(), "zero-filled recharge columns");
    Ok((FeatureTable::with_schema(df, table.schema().clone()), filled))
}

/// Log rows where a recharge value and its date disagree about being missing.
///
/// The source data records both or neither, so the value is zero-filled and the
/// date is dropped with the other date columns.
fn warn_on_unpaired_recharges(df: &DataFrame) {
    for (value_base, date_base) in RECHARGE_PAIRS {
        for month in Month::ALL {
            let (Ok(value), Ok(date)) = (
                df.column(&month.column(value_base)),
                df.column(&month.column(date_base)),
            ) else {
                continue;
            };
            let value_nulls = value.is_null();
            let date_nulls = date.is_null();
            let mismatched = (&value_nulls ^ &date_nulls).num_trues();
            if mismatched > 0 {
                tracing::warn!(
                    value = %month.column(value_base),
                    date = %month.column(date_base),
                    rows = mismatched,
                    "recharge value and date are not missing together"
                );
            }
        }
    }
}

/// Pass 2: drop identifier and date columns.
pub fn drop_identifiers_and_dates(table: &FeatureTable) -> (FeatureTable, Vec<String>) {
    let schema = table.schema();
    let mut to_drop = schema.names_of(ColumnKind::Identifier);
    to_drop.extend(schema.names_of(ColumnKind::Date));

    let df = table.frame().drop_many(&to_drop);
    let schema = schema.without(&to_drop);
    (FeatureTable::with_schema(df, schema), to_drop)
}

/// Pass 3: replace missing categorical values with the sentinel category.
pub fn fill_categorical_sentinel(table: &FeatureTable) -> Result<(FeatureTable, Vec<String>)> {
    let mut df = table.frame().clone();
    let mut filled = Vec::new();

    for name in table.schema().categorical_features() {
        let column = df.column(&name).at(STAGE)?.clone();
        let replacement = if column.dtype().is_primitive_numeric()
            || column.null_count() == column.len()
        {
            let values: Vec<f64> = float_values(&df, &name, STAGE)?
                .into_iter()
                .map(|v| v.unwrap_or(SENTINEL_CATEGORY as f64))
                .collect();
            Column::new(name.as_str().into(), values)
        } else {
            let values: Vec<String> = category_keys(&column)
                .at(STAGE)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| SENTINEL_KEY.to_string()))
                .collect();
            Column::new(name.as_str().into(), values)
        };
        df = with_replaced(&df, replacement, STAGE)?;
        filled.push(name);
    }

    Ok((FeatureTable::with_schema(df, table.schema().clone()), filled))
}

/// Pass 4: drop columns whose missing fraction reaches the threshold.
pub fn drop_sparse_columns(table: &FeatureTable, threshold: f64) -> (FeatureTable, Vec<String>) {
    let ratios = analyze_missing_values(table.frame());
    let to_drop = get_features_at_or_above_threshold(&ratios, threshold);

    for name in &to_drop {
        tracing::debug!(column = %name, "dropping sparse column");
    }

    let df = table.frame().drop_many(&to_drop);
    let schema = table.schema().without(&to_drop);
    (FeatureTable::with_schema(df, schema), to_drop)
}

/// Run every imputation pass. The returned table has no missing values.
pub fn impute_missing(
    table: &FeatureTable,
    threshold: f64,
    config: &ImputeConfig,
) -> Result<(FeatureTable, ImputeReport)> {
    if table.height() == 0 {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let (table, zero_filled) = zero_impute(table)?;
    let (table, dropped_id_date) = drop_identifiers_and_dates(&table);
    let (table, sentinel_filled) = fill_categorical_sentinel(&table)?;
    let (table, dropped_sparse) = drop_sparse_columns(&table, threshold);

    let incomplete: Vec<String> = table
        .frame()
        .get_columns()
        .iter()
        .filter(|col| col.null_count() > 0)
        .map(|col| col.name().to_string())
        .collect();

    let (df, outcome) = impute_chained(table.frame(), &incomplete, config)?;
    let table = FeatureTable::with_schema(df, table.schema().clone());

    tracing::info!(
        columns = table.width(),
        imputed = incomplete.len(),
        dropped = dropped_id_date.len() + dropped_sparse.len(),
        sweeps = outcome.sweeps,
        "missing values resolved"
    );

    Ok((
        table,
        ImputeReport {
            zero_filled,
            dropped_id_date,
            sentinel_filled,
            dropped_sparse,
            imputed: incomplete,
            sweeps: outcome.sweeps,
            converged: outcome.converged,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_missing_values_sorted() {
        let df = df! {
            "a" => [Some(1.0f64), None, None, Some(4.0)],
            "b" => [Some(1.0f64), Some(2.0), None, Some(4.0)],
            "c" => [1.0f64, 2.0, 3.0, 4.0],
        }
        .unwrap();
        let ratios = analyze_missing_values(&df);
        assert_eq!(ratios[0], ("a".to_string(), 0.5));
        assert_eq!(ratios[1], ("b".to_string(), 0.25));
        assert_eq!(ratios[2], ("c".to_string(), 0.0));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let ratios = vec![
            ("at".to_string(), 0.7),
            ("below".to_string(), 0.6),
            ("above".to_string(), 0.9),
        ];
        let to_drop = get_features_at_or_above_threshold(&ratios, 0.7);
        assert_eq!(to_drop, vec!["at".to_string(), "above".to_string()]);
    }

    #[test]
    fn test_sentinel_fill_on_string_categorical() {
        let df = df! {
            "fb_user_6" => [Some("1"), None, Some("0")],
        }
        .unwrap();
        let table = FeatureTable::from_raw(df);
        let (filled, names) = fill_categorical_sentinel(&table).unwrap();
        assert_eq!(names, vec!["fb_user_6".to_string()]);
        let col = filled.frame().column("fb_user_6").unwrap();
        let values: Vec<Option<&str>> = col.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("1"), Some("-1"), Some("0")]);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let df = df! { "arpu_6" => Vec::<f64>::new() }.unwrap();
        let table = FeatureTable::from_raw(df);
        let err = impute_missing(&table, 0.7, &ImputeConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
    }
}
