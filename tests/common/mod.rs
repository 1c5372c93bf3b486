//! Shared test utilities and fixture generators
#![allow(dead_code)]

use churnprep::pipeline::{derive_churn_label, FeatureTable, DEFAULT_DELTA_METRICS};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// Month suffixes present in the synthetic table
pub const MONTHS: [u8; 4] = [6, 7, 8, 9];

const MONTH_ENDS: [&str; 4] = ["6/30/2014", "7/31/2014", "8/31/2014", "9/30/2014"];

const PREFIXES: [&str; 4] = ["jun", "jul", "aug", "sep"];

/// Month-4 usage columns that define churn
pub const CHURN_INPUTS: [&str; 4] = ["total_ic_mou_9", "total_og_mou_9", "vol_2g_mb_9", "vol_3g_mb_9"];

/// Create a synthetic four-month telecom usage table
///
/// Per row, roughly:
/// - 30% of subscribers have zero calls and data in month 9 (churners)
/// - 40% never recharged data in a month; their data recharge columns, data
///   recharge date and both categorical flags are missing together
/// - `onnet_mou_6..8` miss 5% of values at random (multivariate imputation)
/// - `arpu_3g_6..9` miss about 80% of values (dropped at 0.7)
/// - `loc_og_t2o_mou` is constant
pub fn create_telecom_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns: Vec<Column> = Vec::new();

    let mobile: Vec<i64> = (0..rows as i64).map(|i| 7_000_000_000 + i).collect();
    columns.push(Column::new("mobile_number".into(), mobile));
    columns.push(Column::new("circle_id".into(), vec![109i64; rows]));
    columns.push(Column::new("loc_og_t2o_mou".into(), vec![0.0f64; rows]));

    let churner: Vec<bool> = (0..rows).map(|_| rng.gen_bool(0.3)).collect();

    for (m, &month) in MONTHS.iter().enumerate() {
        let has_data: Vec<bool> = (0..rows).map(|_| rng.gen_bool(0.6)).collect();
        let outcome = month == 9;

        for metric in DEFAULT_DELTA_METRICS {
            let name = format!("{}_{}", metric, month);
            let values: Vec<Option<f64>> = (0..rows)
                .map(|row| match metric {
                    "total_rech_data" | "max_rech_data" | "av_rech_amt_data" if !has_data[row] => {
                        None
                    }
                    "total_rech_data" => Some(rng.gen_range(1..4) as f64),
                    "max_rech_data" | "av_rech_amt_data" => Some(rng.gen_range(10.0..50.0)),
                    "total_rech_amt" | "max_rech_amt" => Some(rng.gen_range(100.0..1000.0)),
                    "total_ic_mou" | "total_og_mou" | "vol_2g_mb" | "vol_3g_mb"
                        if outcome && churner[row] =>
                    {
                        Some(0.0)
                    }
                    "onnet_mou" if !outcome && rng.gen_bool(0.05) => None,
                    _ => Some(rng.gen_range(0.0..500.0)),
                })
                .collect();
            columns.push(Column::new(name.into(), values));
        }

        let data_date: Vec<Option<String>> = has_data
            .iter()
            .map(|&d| d.then(|| MONTH_ENDS[m].to_string()))
            .collect();
        columns.push(Column::new(
            format!("last_date_of_month_{}", month).into(),
            vec![MONTH_ENDS[m].to_string(); rows],
        ));
        columns.push(Column::new(
            format!("date_of_last_rech_{}", month).into(),
            vec![MONTH_ENDS[m].to_string(); rows],
        ));
        columns.push(Column::new(
            format!("date_of_last_rech_data_{}", month).into(),
            data_date,
        ));

        for flag in ["night_pck_user", "fb_user"] {
            let values: Vec<Option<f64>> = has_data
                .iter()
                .map(|&d| d.then(|| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }))
                .collect();
            columns.push(Column::new(format!("{}_{}", flag, month).into(), values));
        }

        let sparse: Vec<Option<f64>> = (0..rows)
            .map(|_| rng.gen_bool(0.2).then(|| rng.gen_range(0.0..100.0)))
            .collect();
        columns.push(Column::new(format!("arpu_3g_{}", month).into(), sparse));

        let vbc: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..200.0)).collect();
        columns.push(Column::new(format!("{}_vbc_3g", PREFIXES[m]).into(), vbc));
    }

    let aon: Vec<f64> = (0..rows).map(|_| rng.gen_range(180.0..4000.0)).collect();
    columns.push(Column::new("aon".into(), aon));

    DataFrame::new(columns).unwrap()
}

/// Build a labelled table whose `churn` column equals `labels`
///
/// The frame carries the month-9 usage columns needed to derive the label plus
/// the `extra` columns, which survive labelling when they are not month 9.
pub fn labelled_table(labels: &[i32], extra: Vec<Column>) -> FeatureTable {
    let usage: Vec<f64> = labels
        .iter()
        .map(|&l| if l == 1 { 0.0 } else { 10.0 })
        .collect();
    let mut columns: Vec<Column> = CHURN_INPUTS
        .iter()
        .map(|name| Column::new((*name).into(), usage.clone()))
        .collect();
    columns.extend(extra);

    let table = FeatureTable::from_raw(DataFrame::new(columns).unwrap());
    let (labelled, _) = derive_churn_label(&table).unwrap();
    labelled
}

/// Read a column as `Option<f64>` values
pub fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

/// Read a column that must be complete as `f64` values
pub fn dense_f64(df: &DataFrame, name: &str) -> Vec<f64> {
    f64_values(df, name)
        .into_iter()
        .map(|v| v.unwrap_or_else(|| panic!("null in column {}", name)))
        .collect()
}

/// Read the churn label
pub fn labels(df: &DataFrame) -> Vec<i32> {
    df.column("churn")
        .unwrap()
        .i32()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("telecom.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("telecom.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Expected column '{}' not found in {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Column '{}' should have been removed",
            col
        );
    }
}
