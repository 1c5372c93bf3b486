//! churnprep: churn feature-engineering CLI
//!
//! Reads a four-month telecom usage table, runs the preparation pipeline and
//! writes stratified train/test tables plus a JSON run report.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use churnprep::cli::Cli;
use churnprep::error::Stage;
use churnprep::pipeline::{load_dataset, run_pipeline, save_dataset};
use churnprep::report::{export_report, ReportPaths};
use churnprep::utils::{
    create_spinner, finish_with_error, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_directive())?;

    let config = cli.to_config();
    let quiet = cli.quiet;
    let output_dir = cli.output_dir();
    let (train_path, test_path) = cli.output_paths();

    if !quiet {
        print_banner(env!("CARGO_PKG_VERSION"));
        print_config(&cli.input, &output_dir, &config);
    }

    // Step 1: Load dataset
    if !quiet {
        print_step_header(1, "Load Dataset");
    }
    let step_start = Instant::now();
    let spinner = create_spinner("Reading input file...", quiet);
    let raw = match load_dataset(&cli.input, cli.infer_schema_length) {
        Ok(df) => df,
        Err(e) => {
            finish_with_error(&spinner, "Failed to load dataset");
            return Err(e);
        }
    };
    finish_with_success(&spinner, "Dataset loaded");
    if !quiet {
        println!("\n    {} Dataset Statistics:", style("✧").cyan());
        println!("      Rows: {}", raw.height());
        println!("      Columns: {}", raw.width());
        println!(
            "      Estimated memory: {:.2} MB",
            raw.estimated_size() as f64 / (1024.0 * 1024.0)
        );
        print_step_time(step_start.elapsed());
    }

    // Step 2: Run the pipeline
    if !quiet {
        print_step_header(2, "Feature Engineering");
    }
    let step_start = Instant::now();
    let spinner = create_spinner("Imputing, filtering, labelling and encoding...", quiet);
    let output = match run_pipeline(raw, &config) {
        Ok(output) => output,
        Err(e) => {
            finish_with_error(&spinner, &format!("{} failed", e.stage()));
            return Err(e).context("Pipeline run failed");
        }
    };
    finish_with_success(&spinner, "Pipeline complete");
    if !quiet {
        if let Some(record) = output.summary.stage(Stage::HighValueFilter) {
            print_count(
                "high-value subscribers kept",
                record.rows,
                Some(&format!("(average recharge >= {:.2})", output.cutoff.cutoff)),
            );
        }
        print_count(
            "columns dropped for missing values",
            output.impute.dropped_sparse.len(),
            Some(&format!("(>= {:.1}%)", config.missing_threshold * 100.0)),
        );
        print_count(
            "delta features added",
            output.summary.columns_added(Stage::DeltaFeatures),
            None,
        );
        print_step_time(step_start.elapsed());
    }

    // Step 3: Save output
    if !quiet {
        print_step_header(3, "Save Results");
    }
    let step_start = Instant::now();
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    let spinner = create_spinner("Writing train and test files...", quiet);
    let mut train = output.train.frame().clone();
    let mut test = output.test.frame().clone();
    save_dataset(&mut train, &train_path)?;
    save_dataset(&mut test, &test_path)?;
    finish_with_success(
        &spinner,
        &format!("Saved {} and {}", train_path.display(), test_path.display()),
    );

    if cli.no_report {
        if !quiet {
            print_info("Run report skipped");
        }
    } else {
        let report_path = cli.report_path();
        let paths = ReportPaths {
            input: &cli.input,
            train: &train_path,
            test: &test_path,
        };
        export_report(&output, &config, &paths, &report_path)?;
        if !quiet {
            print_success(&format!("Report written to {}", report_path.display()));
        }
    }

    if !quiet {
        print_step_time(step_start.elapsed());
        output.summary.display();
        print_completion();
    }

    Ok(())
}

/// Install the tracing subscriber; RUST_LOG overrides the CLI directive
fn init_tracing(directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
