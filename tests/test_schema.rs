//! Tests for column classification

mod common;

use churnprep::pipeline::{classify_columns, ColumnKind, FeatureTable, Month};
use common::create_telecom_dataframe;

#[test]
fn test_fixture_classification_counts() {
    let table = FeatureTable::from_raw(create_telecom_dataframe(20, 1));
    let schema = table.schema();

    assert_eq!(schema.len(), table.width());
    assert_eq!(
        schema.names_of(ColumnKind::Identifier),
        vec!["mobile_number".to_string(), "circle_id".to_string()]
    );
    // Three date columns per month
    assert_eq!(schema.names_of(ColumnKind::Date).len(), 12);
    // night_pck_user and fb_user per month
    assert_eq!(schema.categorical_features().len(), 8);
    assert!(schema.label().is_none());
}

#[test]
fn test_every_column_gets_exactly_one_kind() {
    let table = FeatureTable::from_raw(create_telecom_dataframe(5, 2));
    let schema = table.schema();
    let total: usize = [
        ColumnKind::Identifier,
        ColumnKind::Date,
        ColumnKind::Categorical,
        ColumnKind::Numeric,
    ]
    .iter()
    .map(|k| schema.names_of(*k).len())
    .sum();
    assert_eq!(total, table.width());
}

#[test]
fn test_outcome_month_includes_prefix_columns() {
    let table = FeatureTable::from_raw(create_telecom_dataframe(5, 3));
    let september = table.schema().month_columns(Month::OUTCOME);

    assert!(september.contains(&"sep_vbc_3g".to_string()));
    assert!(september.contains(&"arpu_9".to_string()));
    assert!(september.contains(&"date_of_last_rech_data_9".to_string()));
    assert!(!september.contains(&"aug_vbc_3g".to_string()));
    assert!(!september.contains(&"aon".to_string()));
}

#[test]
fn test_unknown_names_default_to_numeric() {
    let schema = classify_columns(&["aon", "loc_og_t2o_mou", "brand_new_metric_6"]);
    for name in ["aon", "loc_og_t2o_mou", "brand_new_metric_6"] {
        assert_eq!(schema.kind_of(name), Some(ColumnKind::Numeric));
    }
    assert_eq!(schema.get("brand_new_metric_6").unwrap().month, Some(Month::June));
    assert_eq!(schema.get("aon").unwrap().month, None);
}
