//! Command-line argument definitions using clap

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::pipeline::{
    ImputeConfig, PipelineConfig, DEFAULT_CAP_K, DEFAULT_HIGH_VALUE_QUANTILE,
    DEFAULT_MISSING_THRESHOLD, DEFAULT_SEED, DEFAULT_TEST_FRACTION,
};

/// churnprep - Turn a four-month telecom usage table into churn-model training data
#[derive(Parser, Debug)]
#[command(name = "churnprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the train/test files and the run report.
    /// Defaults to the input file's directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Drop columns whose missing fraction reaches this value
    #[arg(long, default_value_t = DEFAULT_MISSING_THRESHOLD, value_parser = validate_missing_threshold)]
    pub missing_threshold: f64,

    /// Percentile (0 to 1) of the average recharge amount a subscriber must reach
    #[arg(long, default_value_t = DEFAULT_HIGH_VALUE_QUANTILE, value_parser = validate_unit_interval)]
    pub high_value_quantile: f64,

    /// Capping band half-width in standard deviations
    #[arg(long, default_value_t = DEFAULT_CAP_K, value_parser = validate_positive)]
    pub cap_k: f64,

    /// Fraction of subscribers held out for testing
    #[arg(long, default_value_t = DEFAULT_TEST_FRACTION, value_parser = validate_test_fraction)]
    pub test_fraction: f64,

    /// Seed for the stratified split
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Number of completed tables averaged by the imputer
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub impute_draws: u64,

    /// Maximum imputation sweeps before the draws are taken
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub impute_max_iterations: u64,

    /// Imputation stops once the largest relative change of a sweep drops below this
    #[arg(long, default_value = "0.001", value_parser = validate_non_negative)]
    pub impute_tolerance: f64,

    /// Add residual noise to each imputation draw
    #[arg(long, default_value = "false")]
    pub posterior_sampling: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Log level for pipeline events (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Only print warnings and errors
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Skip writing the JSON run report
    #[arg(long, default_value = "false")]
    pub no_report: bool,
}

impl Cli {
    /// Build the pipeline configuration from the parsed flags
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            missing_threshold: self.missing_threshold,
            high_value_quantile: self.high_value_quantile,
            cap_k: self.cap_k,
            test_fraction: self.test_fraction,
            seed: self.seed,
            impute: ImputeConfig {
                draws: self.impute_draws as usize,
                max_iterations: self.impute_max_iterations as usize,
                tolerance: self.impute_tolerance,
                posterior_sampling: self.posterior_sampling,
                ..ImputeConfig::default()
            },
        }
    }

    /// Directory that receives every output file
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            self.input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf()
        })
    }

    fn stem(&self) -> &str {
        self.input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }

    /// Train and test output paths, `<stem>_train.<ext>` and `<stem>_test.<ext>`
    pub fn output_paths(&self) -> (PathBuf, PathBuf) {
        let extension = self
            .input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("parquet");
        let dir = self.output_dir();
        (
            dir.join(format!("{}_train.{}", self.stem(), extension)),
            dir.join(format!("{}_test.{}", self.stem(), extension)),
        )
    }

    /// Run report path, `<stem>_pipeline_report.json`
    pub fn report_path(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}_pipeline_report.json", self.stem()))
    }

    /// Filter directive for the tracing subscriber
    pub fn log_directive(&self) -> &str {
        if self.quiet {
            "warn"
        } else {
            &self.log_level
        }
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for missing_threshold, in (0, 1]
fn validate_missing_threshold(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "missing_threshold must be in (0, 1], got {}",
            value
        ))
    }
}

/// Validator for quantiles, in [0, 1]
fn validate_unit_interval(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    }
}

/// Validator for test_fraction, in (0, 1)
fn validate_test_fraction(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("test_fraction must be in (0, 1), got {}", value))
    }
}

fn validate_positive(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("value must be positive, got {}", value))
    }
}

fn validate_non_negative(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("value must be non-negative, got {}", value))
    }
}
