//! Column access helpers shared by the stages

use polars::prelude::*;

use crate::error::{PipelineError, Result, Stage, StageContext};

/// Fail with the full list of absent columns
pub(crate) fn require_columns<S: AsRef<str>>(
    df: &DataFrame,
    names: &[S],
    stage: Stage,
) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| df.column(n).is_err())
        .map(|n| n.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns {
            stage,
            columns: missing,
        })
    }
}

/// Read a numeric column as `f64`, keeping nulls
pub(crate) fn float_values(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumns {
            stage,
            columns: vec![name.to_string()],
        })?;

    // An all-empty CSV column is inferred as text; it carries no values either way.
    if column.null_count() == column.len() {
        return Ok(vec![None; column.len()]);
    }

    if !column.dtype().is_primitive_numeric() {
        return Err(PipelineError::NonNumericColumn {
            stage,
            column: name.to_string(),
            dtype: column.dtype().to_string(),
        });
    }

    let cast = column.cast(&DataType::Float64).at(stage)?;
    let values = cast.f64().at(stage)?.into_iter().collect();
    Ok(values)
}

/// Read a numeric column that must not contain nulls
pub(crate) fn dense_values(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<f64>> {
    float_values(df, name, stage)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::ImputationConvergence {
                stage,
                column: name.to_string(),
                reason: "value still missing after imputation".to_string(),
            })
        })
        .collect()
}

/// Canonical text form of every value in a column, used as a category key.
///
/// Whole floats print without a fractional part, so `-1.0`, `-1` and `"-1"`
/// all key the same category.
pub(crate) fn category_keys(col: &Column) -> PolarsResult<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| u8::from(b).to_string()))
            .collect(),
        dtype if dtype.is_primitive_numeric() => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|n| format!("{}", n)))
                .collect()
        }
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}

/// Return a copy of `df` with `column` added or replaced
pub(crate) fn with_replaced(df: &DataFrame, column: Column, stage: Stage) -> Result<DataFrame> {
    let mut next = df.clone();
    next.with_column(column).at(stage)?;
    Ok(next)
}
