//! Column schema for the four-month telecom usage table
//!
//! Columns are classified once, by name, into identifier, date, categorical
//! or numeric kinds. The month each column belongs to is recorded at the same
//! time so later stages select month-specific columns through the schema
//! instead of matching name patterns themselves.

use std::collections::HashSet;

use polars::prelude::*;
use serde::Serialize;

/// Name of the derived binary target column
pub const LABEL_COLUMN: &str = "churn";

/// Identifier columns
pub const ID_COLUMNS: [&str; 2] = ["mobile_number", "circle_id"];

/// Per-month date columns (base names)
pub const DATE_BASES: [&str; 3] = [
    "last_date_of_month",
    "date_of_last_rech",
    "date_of_last_rech_data",
];

/// Category standing for "unknown" in categorical columns
pub const SENTINEL_CATEGORY: i32 = -1;

/// Text key of the sentinel category
pub const SENTINEL_KEY: &str = "-1";

/// Per-month categorical columns (base names)
pub const CATEGORICAL_BASES: [&str; 2] = ["night_pck_user", "fb_user"];

/// One of the four consecutive months covered by the raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Month {
    June,
    July,
    August,
    September,
}

impl Month {
    pub const ALL: [Month; 4] = [Month::June, Month::July, Month::August, Month::September];

    /// Months whose behaviour feeds the features
    pub const BEHAVIOUR: [Month; 3] = [Month::June, Month::July, Month::August];

    /// The month used only to derive the label
    pub const OUTCOME: Month = Month::September;

    /// Numeric suffix used in column names (`arpu_6`)
    pub fn suffix(&self) -> u8 {
        match self {
            Month::June => 6,
            Month::July => 7,
            Month::August => 8,
            Month::September => 9,
        }
    }

    /// Prefix used by a few columns (`jun_vbc_3g`)
    pub fn prefix(&self) -> &'static str {
        match self {
            Month::June => "jun",
            Month::July => "jul",
            Month::August => "aug",
            Month::September => "sep",
        }
    }

    /// Column name for `base` in this month
    pub fn column(&self, base: &str) -> String {
        format!("{}_{}", base, self.suffix())
    }

    /// Recognise the month a column name belongs to, if any
    pub fn of_column(name: &str) -> Option<Month> {
        if let Some((_, suffix)) = name.rsplit_once('_') {
            if let Some(month) = Month::ALL.iter().find(|m| suffix == m.suffix().to_string()) {
                return Some(*month);
            }
        }
        let (prefix, rest) = name.split_once('_')?;
        if rest.is_empty() {
            return None;
        }
        Month::ALL.iter().copied().find(|m| m.prefix() == prefix)
    }
}

/// Declared kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnKind {
    Identifier,
    Date,
    Categorical,
    Numeric,
}

/// Classification of a single column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub month: Option<Month>,
}

/// Ordered, exhaustive classification of a table's columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<ColumnSpec>,
    label: Option<String>,
}

fn fixed_names(bases: &[&str]) -> HashSet<String> {
    bases
        .iter()
        .flat_map(|base| Month::ALL.iter().map(move |m| m.column(base)))
        .collect()
}

/// Classify raw column names. Unrecognised names default to numeric.
pub fn classify_columns<S: AsRef<str>>(names: &[S]) -> ColumnSchema {
    let dates = fixed_names(&DATE_BASES);
    let categoricals = fixed_names(&CATEGORICAL_BASES);

    let columns = names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let kind = if ID_COLUMNS.contains(&name) {
                ColumnKind::Identifier
            } else if dates.contains(name) {
                ColumnKind::Date
            } else if categoricals.contains(name) {
                ColumnKind::Categorical
            } else {
                ColumnKind::Numeric
            };
            ColumnSpec {
                name: name.to_string(),
                kind,
                month: Month::of_column(name),
            }
        })
        .collect();

    ColumnSchema {
        columns,
        label: None,
    }
}

impl ColumnSchema {
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.get(name).map(|c| c.kind)
    }

    /// Names of every column of `kind`, including the label when it matches
    pub fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Categorical feature columns (the label excluded)
    pub fn categorical_features(&self) -> Vec<String> {
        self.names_of(ColumnKind::Categorical)
            .into_iter()
            .filter(|name| Some(name.as_str()) != self.label.as_deref())
            .collect()
    }

    /// Numeric feature columns
    pub fn numeric_features(&self) -> Vec<String> {
        self.names_of(ColumnKind::Numeric)
    }

    /// Every column recorded for `month`
    pub fn month_columns(&self, month: Month) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.month == Some(month))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// New schema with `name` appended (or reclassified when already present)
    pub fn with_column(&self, name: &str, kind: ColumnKind) -> ColumnSchema {
        let mut next = self.clone();
        match next.columns.iter_mut().find(|c| c.name == name) {
            Some(spec) => spec.kind = kind,
            None => next.columns.push(ColumnSpec {
                name: name.to_string(),
                kind,
                month: None,
            }),
        }
        next
    }

    /// New schema with `name` added as the categorical label
    pub fn with_label(&self, name: &str) -> ColumnSchema {
        let mut next = self.with_column(name, ColumnKind::Categorical);
        next.label = Some(name.to_string());
        next
    }

    /// New schema without the given columns
    pub fn without<S: AsRef<str>>(&self, names: &[S]) -> ColumnSchema {
        let drop: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        ColumnSchema {
            columns: self
                .columns
                .iter()
                .filter(|c| !drop.contains(c.name.as_str()))
                .cloned()
                .collect(),
            label: self.label.clone().filter(|l| !drop.contains(l.as_str())),
        }
    }
}

/// A dataframe together with the schema describing its columns.
///
/// Stages never mutate a table they receive; they build and return a new one.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    frame: DataFrame,
    schema: ColumnSchema,
}

impl FeatureTable {
    /// Wrap a raw frame, classifying its columns by name
    pub fn from_raw(frame: DataFrame) -> Self {
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let schema = classify_columns(&names);
        tracing::debug!(
            identifiers = schema.names_of(ColumnKind::Identifier).len(),
            dates = schema.names_of(ColumnKind::Date).len(),
            categoricals = schema.names_of(ColumnKind::Categorical).len(),
            numerics = schema.names_of(ColumnKind::Numeric).len(),
            "classified columns"
        );
        Self { frame, schema }
    }

    /// Pair a frame with an already-derived schema
    pub(crate) fn with_schema(frame: DataFrame, schema: ColumnSchema) -> Self {
        debug_assert_eq!(frame.width(), schema.len());
        Self { frame, schema }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}
