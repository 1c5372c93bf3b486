//! Stratified train/test split on the churn label

use std::collections::BTreeMap;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::schema::FeatureTable;
use crate::error::{PipelineError, Result, Stage, StageContext};

const STAGE: Stage = Stage::StratifiedSplit;

/// Sizes and positive rates of the two partitions
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_positive_rate: f64,
    pub test_positive_rate: f64,
}

/// Read the label column as class values
pub fn label_values(table: &FeatureTable, stage: Stage) -> Result<Vec<i32>> {
    let label = table.schema().label().ok_or_else(|| PipelineError::MissingColumns {
        stage,
        columns: vec![super::schema::LABEL_COLUMN.to_string()],
    })?;
    let column = table.frame().column(label).at(stage)?;
    let cast = column.cast(&DataType::Int32).at(stage)?;
    let values = cast
        .i32()
        .at(stage)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::EmptyResult {
                stage,
                what: "label column with missing values".to_string(),
            })
        })
        .collect::<Result<Vec<i32>>>()?;
    Ok(values)
}

fn positive_rate(labels: &[i32], rows: &[IdxSize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let positives = rows.iter().filter(|&&r| labels[r as usize] == 1).count();
    positives as f64 / rows.len() as f64
}

/// Split rows into training and held-out partitions, class by class.
///
/// Each class sends `round(n * test_fraction)` of its rows, chosen by a seeded
/// shuffle, to the held-out partition. Both partitions keep input row order.
pub fn stratified_split(
    table: &FeatureTable,
    test_fraction: f64,
    seed: u64,
) -> Result<(FeatureTable, FeatureTable, SplitReport)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig {
            stage: STAGE,
            message: format!("test fraction must be in (0, 1), got {}", test_fraction),
        });
    }
    if table.height() == 0 {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }

    let labels = label_values(table, STAGE)?;
    // Both label levels must be present, even when a class has no members
    let mut classes: BTreeMap<i32, Vec<IdxSize>> = [(0, Vec::new()), (1, Vec::new())].into();
    for (row, &label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(row as IdxSize);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(labels.len());
    let mut test_rows = Vec::with_capacity(labels.len());

    for (class, mut rows) in classes {
        let members = rows.len();
        let n_test = (members as f64 * test_fraction).round() as usize;
        if n_test == 0 || n_test == members {
            return Err(PipelineError::Stratification {
                stage: STAGE,
                class,
                members,
                test_fraction,
            });
        }
        rows.shuffle(&mut rng);
        test_rows.extend_from_slice(&rows[..n_test]);
        train_rows.extend_from_slice(&rows[n_test..]);
    }

    train_rows.sort_unstable();
    test_rows.sort_unstable();

    let report = SplitReport {
        train_rows: train_rows.len(),
        test_rows: test_rows.len(),
        train_positive_rate: positive_rate(&labels, &train_rows),
        test_positive_rate: positive_rate(&labels, &test_rows),
    };

    let train_idx = IdxCa::from_vec("train".into(), train_rows);
    let test_idx = IdxCa::from_vec("test".into(), test_rows);
    let train = table.frame().take(&train_idx).at(STAGE)?;
    let test = table.frame().take(&test_idx).at(STAGE)?;

    tracing::info!(
        train = report.train_rows,
        test = report.test_rows,
        train_rate = report.train_positive_rate,
        test_rate = report.test_positive_rate,
        "split subscribers"
    );

    Ok((
        FeatureTable::with_schema(train, table.schema().clone()),
        FeatureTable::with_schema(test, table.schema().clone()),
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::{classify_columns, LABEL_COLUMN};

    fn labelled(labels: Vec<i32>) -> FeatureTable {
        let n = labels.len();
        let df = df! {
            "arpu_6" => (0..n).map(|v| v as f64).collect::<Vec<_>>(),
            LABEL_COLUMN => labels,
        }
        .unwrap();
        let schema = classify_columns(&["arpu_6"]).with_label(LABEL_COLUMN);
        FeatureTable::with_schema(df, schema)
    }

    #[test]
    fn test_partitions_cover_every_row_once() {
        let labels: Vec<i32> = (0..50).map(|i| i32::from(i % 5 == 0)).collect();
        let (train, test, _) = stratified_split(&labelled(labels), 0.2, 1).unwrap();
        assert_eq!(train.height() + test.height(), 50);

        let mut ids: Vec<f64> = train
            .frame()
            .column("arpu_6")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .chain(test.frame().column("arpu_6").unwrap().f64().unwrap().into_no_null_iter())
            .collect();
        ids.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ids, (0..50).map(|v| v as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let labels: Vec<i32> = (0..40).map(|i| i32::from(i % 4 == 0)).collect();
        let table = labelled(labels);
        let (a, _, _) = stratified_split(&table, 0.25, 9).unwrap();
        let (b, _, _) = stratified_split(&table, 0.25, 9).unwrap();
        assert!(a.frame().equals(b.frame()));
    }

    #[test]
    fn test_single_member_class_cannot_stratify() {
        let mut labels = vec![0; 9];
        labels.push(1);
        let err = stratified_split(&labelled(labels), 0.2, 1).unwrap_err();
        assert!(matches!(err, PipelineError::Stratification { class: 1, .. }));
    }

    #[test]
    fn test_absent_class_cannot_stratify() {
        let err = stratified_split(&labelled(vec![1; 10]), 0.2, 1).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stratification {
                class: 0,
                members: 0,
                ..
            }
        ));
    }
}
