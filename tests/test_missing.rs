//! Tests for the missingness imputer

mod common;

use churnprep::error::{PipelineError, Stage};
use churnprep::pipeline::{
    drop_sparse_columns, fill_categorical_sentinel, impute_missing, zero_impute, FeatureTable,
    ImputeConfig,
};
use common::{
    assert_has_columns, assert_missing_columns, create_telecom_dataframe, dense_f64, f64_values,
};
use polars::prelude::*;

fn ten_rows_with_missing(missing: usize) -> FeatureTable {
    let values: Vec<Option<f64>> = (0..10)
        .map(|i| if i < missing { None } else { Some(i as f64) })
        .collect();
    FeatureTable::from_raw(
        df! {
            "sparse_metric" => values,
            "aon" => (0..10).map(|i| 100.0 + i as f64 * 3.0).collect::<Vec<f64>>(),
            "arpu_6" => (0..10).map(|i| (i * i) as f64).collect::<Vec<f64>>(),
        }
        .unwrap(),
    )
}

#[test]
fn test_seventy_percent_missing_is_dropped_at_point_seven() {
    let (out, report) =
        impute_missing(&ten_rows_with_missing(7), 0.7, &ImputeConfig::default()).unwrap();
    assert_missing_columns(out.frame(), &["sparse_metric"]);
    assert_eq!(report.dropped_sparse, vec!["sparse_metric".to_string()]);
}

#[test]
fn test_sixty_percent_missing_is_kept_and_imputed() {
    let (out, report) =
        impute_missing(&ten_rows_with_missing(6), 0.7, &ImputeConfig::default()).unwrap();
    assert_has_columns(out.frame(), &["sparse_metric"]);
    assert_eq!(report.imputed, vec!["sparse_metric".to_string()]);
    assert_eq!(out.frame().column("sparse_metric").unwrap().null_count(), 0);

    // Observed cells pass through untouched
    let values = dense_f64(out.frame(), "sparse_metric");
    assert_eq!(&values[6..], &[6.0, 7.0, 8.0, 9.0]);
}

#[test]
fn test_imputation_that_never_settles_fails() {
    let config = ImputeConfig {
        max_iterations: 1,
        tolerance: 0.0,
        ..ImputeConfig::default()
    };
    let err = impute_missing(&ten_rows_with_missing(6), 0.7, &config).unwrap_err();
    match err {
        PipelineError::ImputationConvergence { stage, column, .. } => {
            assert_eq!(stage, Stage::MissingnessImputer);
            assert_eq!(column, "sparse_metric");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_recharge_columns_are_zero_filled() {
    let table = FeatureTable::from_raw(
        df! {
            "total_rech_data_6" => [Some(2.0f64), None, Some(1.0)],
            "av_rech_amt_data_6" => [Some(25.0f64), None, Some(40.0)],
            "max_rech_data_6" => [Some(25.0f64), None, Some(40.0)],
            "date_of_last_rech_data_6" => [Some("6/21/2014"), None, Some("6/30/2014")],
        }
        .unwrap(),
    );
    let (out, filled) = zero_impute(&table).unwrap();

    assert_eq!(filled.len(), 3);
    assert_eq!(
        f64_values(out.frame(), "total_rech_data_6"),
        vec![Some(2.0), Some(0.0), Some(1.0)]
    );
    assert_eq!(
        f64_values(out.frame(), "av_rech_amt_data_6"),
        vec![Some(25.0), Some(0.0), Some(40.0)]
    );
}

#[test]
fn test_categorical_nulls_become_sentinel() {
    let table = FeatureTable::from_raw(
        df! {
            "fb_user_7" => [Some(1.0f64), None, Some(0.0), None],
            "night_pck_user_7" => [Some(0.0f64), Some(0.0), None, Some(1.0)],
        }
        .unwrap(),
    );
    let (out, filled) = fill_categorical_sentinel(&table).unwrap();
    assert_eq!(filled.len(), 2);
    assert_eq!(
        dense_f64(out.frame(), "fb_user_7"),
        vec![1.0, -1.0, 0.0, -1.0]
    );
    assert_eq!(
        dense_f64(out.frame(), "night_pck_user_7"),
        vec![0.0, 0.0, -1.0, 1.0]
    );
}

#[test]
fn test_drop_sparse_leaves_complete_columns() {
    let (out, dropped) = drop_sparse_columns(&ten_rows_with_missing(9), 0.5);
    assert_eq!(dropped, vec!["sparse_metric".to_string()]);
    assert_eq!(out.schema().len(), 2);
}

#[test]
fn test_fixture_is_complete_after_imputation() {
    let table = FeatureTable::from_raw(create_telecom_dataframe(400, 11));
    let (out, report) = impute_missing(&table, 0.7, &ImputeConfig::default()).unwrap();

    for column in out.frame().get_columns() {
        assert_eq!(column.null_count(), 0, "column {} has nulls", column.name());
    }
    assert_eq!(out.height(), 400);

    assert_missing_columns(
        out.frame(),
        &[
            "mobile_number",
            "circle_id",
            "last_date_of_month_6",
            "date_of_last_rech_7",
            "date_of_last_rech_data_8",
            "arpu_3g_6",
            "arpu_3g_9",
        ],
    );
    assert_eq!(report.dropped_id_date.len(), 2 + 12);
    assert_eq!(report.dropped_sparse.len(), 4);
    assert!(report.imputed.contains(&"onnet_mou_6".to_string()));
    assert_eq!(report.sentinel_filled.len(), 8);
    assert_eq!(out.schema().len(), out.width());
}

#[test]
fn test_zero_rows_is_empty_input() {
    let table = FeatureTable::from_raw(df! { "arpu_6" => Vec::<f64>::new() }.unwrap());
    let err = impute_missing(&table, 0.7, &ImputeConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::EmptyInput {
            stage: Stage::MissingnessImputer
        }
    ));
}
