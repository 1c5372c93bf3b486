//! Categorical target encoding
//!
//! Each category value is replaced by the churn rate observed for it in the
//! training split. The rates are learned from training rows only and then
//! applied unchanged to every split.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;

use super::frame::{category_keys, with_replaced};
use super::schema::{ColumnKind, FeatureTable, SENTINEL_KEY};
use super::split::label_values;
use crate::error::{PipelineError, Result, Stage, StageContext};

const STAGE: Stage = Stage::TargetEncoder;

/// Learned `(column, category) -> mean label` rates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetEncodingMap {
    columns: BTreeMap<String, BTreeMap<String, f64>>,
}

impl TargetEncodingMap {
    /// Learn rates for every categorical feature of the training split
    pub fn fit(train: &FeatureTable) -> Result<Self> {
        let labels = label_values(train, STAGE)?;
        let mut columns = BTreeMap::new();

        for name in train.schema().categorical_features() {
            let column = train.frame().column(&name).at(STAGE)?;
            let keys = category_keys(column).at(STAGE)?;

            let mut tallies: BTreeMap<String, (f64, usize)> = BTreeMap::new();
            for (key, &label) in keys.into_iter().zip(labels.iter()) {
                let key = key.unwrap_or_else(|| SENTINEL_KEY.to_string());
                let entry = tallies.entry(key).or_insert((0.0, 0));
                entry.0 += label as f64;
                entry.1 += 1;
            }

            let rates: BTreeMap<String, f64> = tallies
                .into_iter()
                .map(|(key, (sum, count))| (key, sum / count as f64))
                .collect();
            tracing::debug!(column = %name, categories = rates.len(), "learned category rates");
            columns.insert(name, rates);
        }

        Ok(Self { columns })
    }

    pub fn rate(&self, column: &str, category: &str) -> Option<f64> {
        self.columns.get(column)?.get(category).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn categories(&self, column: &str) -> Option<&BTreeMap<String, f64>> {
        self.columns.get(column)
    }

    /// Replace every learned column with its rates; the columns become numeric.
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureTable> {
        let mut df = table.frame().clone();
        let mut schema = table.schema().clone();

        for (name, rates) in &self.columns {
            let column = df.column(name).map_err(|_| PipelineError::MissingColumns {
                stage: STAGE,
                columns: vec![name.clone()],
            })?;
            let encoded = category_keys(column)
                .at(STAGE)?
                .into_iter()
                .map(|key| {
                    let key = key.unwrap_or_else(|| SENTINEL_KEY.to_string());
                    rates
                        .get(&key)
                        .copied()
                        .ok_or_else(|| PipelineError::UnseenCategory {
                            stage: STAGE,
                            column: name.clone(),
                            value: key,
                        })
                })
                .collect::<Result<Vec<f64>>>()?;

            df = with_replaced(&df, Column::new(name.as_str().into(), encoded), STAGE)?;
            schema = schema.with_column(name, ColumnKind::Numeric);
        }

        Ok(FeatureTable::with_schema(df, schema))
    }
}

/// Learn the map from `train` and encode both splits with it
pub fn encode_splits(
    train: &FeatureTable,
    test: &FeatureTable,
) -> Result<(FeatureTable, FeatureTable, TargetEncodingMap)> {
    let map = TargetEncodingMap::fit(train)?;
    let train = map.transform(train)?;
    let test = map.transform(test)?;
    tracing::info!(columns = map.columns.len(), "target-encoded categoricals");
    Ok((train, test, map))
}
