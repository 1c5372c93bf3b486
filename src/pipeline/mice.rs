//! Chained-equation (MICE) imputation for numeric columns
//!
//! Each incomplete column is regressed on every other numeric column using the
//! rows where it is observed; its missing cells are replaced by predictions.
//! Sweeps repeat until the imputed values settle, then `draws` more sweeps are
//! averaged into the final values. Burn-in that runs out of sweeps before the
//! conditional means settle is an error.

use std::f64::consts::PI;

use faer::prelude::*;
use faer::{Mat, Side};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::ImputeConfig;
use super::frame::{float_values, with_replaced};
use crate::error::{PipelineError, Result, Stage};

const STAGE: Stage = Stage::MissingnessImputer;

/// How the chained sweeps ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainedOutcome {
    /// Total sweeps run, burn-in plus draws
    pub sweeps: usize,
    /// Whether burn-in reached the tolerance
    pub converged: bool,
}

/// Working copy of the numeric columns.
///
/// `z` holds the standardised columns behind an intercept column and `gram`
/// holds `z' z`. Both are updated in place as imputed cells change, so a fit
/// only subtracts the rows where its target is missing.
struct Workspace {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
    missing: Vec<Vec<usize>>,
    means: Vec<f64>,
    scales: Vec<f64>,
    z: Mat<f64>,
    gram: Mat<f64>,
}

/// Regression of one column on all the others, in standardised units
struct Fit {
    predictors: Vec<usize>,
    beta: Mat<f64>,
    sigma: f64,
}

/// Largest scaled change of a sweep and the column where it happened
struct SweepChange {
    max_change: f64,
    column: usize,
}

impl Workspace {
    fn build(df: &DataFrame, targets: &[String]) -> Result<Self> {
        let mut names: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| col.dtype().is_primitive_numeric() && col.null_count() == 0)
            .map(|col| col.name().to_string())
            .filter(|name| !targets.contains(name))
            .collect();
        names.extend(targets.iter().cloned());

        let mut values = Vec::with_capacity(names.len());
        let mut missing = Vec::with_capacity(names.len());
        let mut means = Vec::with_capacity(names.len());
        let mut scales = Vec::with_capacity(names.len());

        for name in &names {
            let raw = float_values(df, name, STAGE)?;
            let observed = raw.iter().flatten().count();
            if observed == 0 {
                return Err(PipelineError::ImputationConvergence {
                    stage: STAGE,
                    column: name.clone(),
                    reason: "column has no observed values".to_string(),
                });
            }

            let n = observed as f64;
            let mean = raw.iter().flatten().sum::<f64>() / n;
            let var = raw.iter().flatten().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let scale = if var > 0.0 { var.sqrt() } else { 1.0 };

            missing.push((0..raw.len()).filter(|&i| raw[i].is_none()).collect::<Vec<_>>());
            values.push(raw.into_iter().map(|v| v.unwrap_or(mean)).collect::<Vec<f64>>());
            means.push(mean);
            scales.push(scale);
        }

        let rows = df.height();
        let z = Mat::<f64>::from_fn(rows, names.len() + 1, |r, c| {
            if c == 0 {
                1.0
            } else {
                (values[c - 1][r] - means[c - 1]) / scales[c - 1]
            }
        });
        let gram = z.transpose() * &z;

        Ok(Workspace {
            names,
            values,
            missing,
            means,
            scales,
            z,
            gram,
        })
    }

    /// Regress `target` on every other column over the rows where it is observed.
    fn fit(&self, target: usize, ridge: f64, want_sigma: bool) -> Result<Fit> {
        let k = target + 1;
        let rows = &self.missing[target];
        let predictors: Vec<usize> = (0..self.gram.ncols()).filter(|&c| c != k).collect();
        let p = predictors.len();

        // Contribution of the rows where the target is missing
        let zm = Mat::<f64>::from_fn(rows.len(), self.gram.ncols(), |i, j| self.z[(rows[i], j)]);
        let excluded = zm.transpose() * &zm;
        let observed = |i: usize, j: usize| self.gram[(i, j)] - excluded[(i, j)];

        // Ridge penalty on the slopes only, scaled by the observed row count
        let n_obs = self.z.nrows() - rows.len();
        let penalty = ridge * n_obs as f64;
        let mut gram = Mat::<f64>::from_fn(p, p, |i, j| observed(predictors[i], predictors[j]));
        for d in 0..p {
            if predictors[d] != 0 {
                gram[(d, d)] += penalty;
            }
        }
        let rhs = Mat::<f64>::from_fn(p, 1, |i, _| observed(predictors[i], k));

        let llt = gram
            .cholesky(Side::Lower)
            .map_err(|_| PipelineError::ImputationConvergence {
                stage: STAGE,
                column: self.names[target].clone(),
                reason: "regression system is not positive definite".to_string(),
            })?;
        let beta = llt.solve(rhs.as_ref());

        let sigma = if want_sigma {
            // ssr = y'y - 2 b'X'y + b'X'X b, without the penalty
            let mut ssr = observed(k, k);
            for i in 0..p {
                ssr -= 2.0 * beta[(i, 0)] * rhs[(i, 0)];
                for j in 0..p {
                    ssr += beta[(i, 0)] * observed(predictors[i], predictors[j]) * beta[(j, 0)];
                }
            }
            let dof = n_obs.saturating_sub(p).max(1) as f64;
            (ssr.max(0.0) / dof).sqrt()
        } else {
            0.0
        };

        Ok(Fit {
            predictors,
            beta,
            sigma,
        })
    }

    fn predict(&self, row: usize, fit: &Fit) -> f64 {
        fit.predictors
            .iter()
            .enumerate()
            .map(|(i, &c)| fit.beta[(i, 0)] * self.z[(row, c)])
            .sum()
    }

    /// Write a new standardised value into `z` and patch the affected Gram entries.
    fn update(&mut self, target: usize, row: usize, value: f64) {
        let k = target + 1;
        let old = self.z[(row, k)];
        let new = (value - self.means[target]) / self.scales[target];
        let delta = new - old;
        for j in 0..self.gram.ncols() {
            if j != k {
                let shift = self.z[(row, j)] * delta;
                self.gram[(j, k)] += shift;
                self.gram[(k, j)] += shift;
            }
        }
        self.gram[(k, k)] += new * new - old * old;
        self.z[(row, k)] = new;
        self.values[target][row] = value;
    }

    /// One pass over every incomplete column.
    fn sweep(&mut self, config: &ImputeConfig, rng: &mut StdRng) -> Result<SweepChange> {
        let mut change = SweepChange {
            max_change: 0.0,
            column: self.missing.iter().position(|m| !m.is_empty()).unwrap_or(0),
        };

        for target in 0..self.values.len() {
            if self.missing[target].is_empty() {
                continue;
            }

            let fit = self.fit(target, config.ridge, config.posterior_sampling)?;

            let rows = self.missing[target].clone();
            for row in rows {
                let mut standardized = self.predict(row, &fit);
                if config.posterior_sampling {
                    standardized += fit.sigma * standard_normal(rng);
                }
                let value = self.means[target] + self.scales[target] * standardized;
                if !value.is_finite() {
                    return Err(PipelineError::ImputationConvergence {
                        stage: STAGE,
                        column: self.names[target].clone(),
                        reason: format!("non-finite prediction for row {}", row),
                    });
                }
                let shift = (value - self.values[target][row]).abs() / self.scales[target];
                if shift > change.max_change {
                    change.max_change = shift;
                    change.column = target;
                }
                self.update(target, row, value);
            }
        }

        Ok(change)
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Complete the `targets` columns of `df` jointly.
///
/// Numeric columns without nulls serve as predictors. The returned frame has
/// the targets rewritten as `Float64` with no nulls; all other columns are
/// unchanged.
pub fn impute_chained(
    df: &DataFrame,
    targets: &[String],
    config: &ImputeConfig,
) -> Result<(DataFrame, ChainedOutcome)> {
    if df.height() == 0 {
        return Err(PipelineError::EmptyInput { stage: STAGE });
    }
    if targets.is_empty() {
        return Ok((
            df.clone(),
            ChainedOutcome {
                sweeps: 0,
                converged: true,
            },
        ));
    }

    let mut ws = Workspace::build(df, targets)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut sweeps = 0;
    let mut converged = false;
    let mut last = SweepChange {
        max_change: f64::INFINITY,
        column: 0,
    };
    while sweeps < config.max_iterations {
        last = ws.sweep(config, &mut rng)?;
        sweeps += 1;
        tracing::debug!(sweep = sweeps, change = last.max_change, "imputation sweep");
        if last.max_change < config.tolerance {
            converged = true;
            break;
        }
    }
    if !converged {
        // Posterior noise keeps every sweep moving, so only conditional means must settle
        if !config.posterior_sampling {
            return Err(PipelineError::ImputationConvergence {
                stage: STAGE,
                column: ws.names[last.column].clone(),
                reason: format!(
                    "largest change {:.3e} still above tolerance {:e} after {} sweeps",
                    last.max_change, config.tolerance, sweeps
                ),
            });
        }
        tracing::warn!(
            sweeps,
            change = last.max_change,
            tolerance = config.tolerance,
            "posterior imputation stopped before reaching tolerance"
        );
    }

    // Average the completed values over the draws
    let first_target = ws.values.len() - targets.len();
    let mut sums: Vec<Vec<f64>> = (first_target..ws.values.len())
        .map(|t| vec![0.0; ws.missing[t].len()])
        .collect();
    for _ in 0..config.draws {
        ws.sweep(config, &mut rng)?;
        sweeps += 1;
        for (slot, t) in (first_target..ws.values.len()).enumerate() {
            for (i, &row) in ws.missing[t].iter().enumerate() {
                sums[slot][i] += ws.values[t][row];
            }
        }
    }

    let draws = config.draws as f64;
    let mut out = df.clone();
    for (slot, t) in (first_target..ws.values.len()).enumerate() {
        let mut completed = ws.values[t].clone();
        for (i, &row) in ws.missing[t].iter().enumerate() {
            completed[row] = sums[slot][i] / draws;
        }
        out = with_replaced(&out, Column::new(ws.names[t].as_str().into(), completed), STAGE)?;
    }

    Ok((out, ChainedOutcome { sweeps, converged }))
}
