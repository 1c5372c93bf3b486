//! Pipeline summary report generation

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use serde::Serialize;

use crate::error::Stage;
use crate::pipeline::{ChurnReport, FeatureTable, ImputeReport, SplitReport};

/// Shape of the table after one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub rows: usize,
    pub columns: usize,
    pub elapsed_ms: u128,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub initial_rows: usize,
    pub initial_columns: usize,
    pub stages: Vec<StageRecord>,
    pub dropped_id_date: Vec<String>,
    pub dropped_sparse: Vec<String>,
    pub dropped_outcome: Vec<String>,
    pub imputed_columns: usize,
    pub churn_rate: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_positive_rate: f64,
    pub test_positive_rate: f64,
}

impl PipelineSummary {
    pub fn new(initial_rows: usize, initial_columns: usize) -> Self {
        Self {
            initial_rows,
            initial_columns,
            ..Default::default()
        }
    }

    pub fn record(&mut self, stage: Stage, table: &FeatureTable, elapsed: Duration) {
        self.stages.push(StageRecord {
            stage,
            rows: table.height(),
            columns: table.width(),
            elapsed_ms: elapsed.as_millis(),
        });
    }

    pub fn set_imputation(&mut self, report: &ImputeReport) {
        self.dropped_id_date = report.dropped_id_date.clone();
        self.dropped_sparse = report.dropped_sparse.clone();
        self.imputed_columns = report.imputed.len();
    }

    pub fn set_churn(&mut self, report: &ChurnReport) {
        self.dropped_outcome = report.dropped_outcome_columns.clone();
        self.churn_rate = report.churn_rate();
    }

    pub fn set_split(&mut self, report: &SplitReport) {
        self.train_rows = report.train_rows;
        self.test_rows = report.test_rows;
        self.train_positive_rate = report.train_positive_rate;
        self.test_positive_rate = report.test_positive_rate;
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Columns a stage added over the one before it
    pub fn columns_added(&self, stage: Stage) -> usize {
        let position = match self.stages.iter().position(|s| s.stage == stage) {
            Some(p) => p,
            None => return 0,
        };
        let before = match position {
            0 => self.initial_columns,
            p => self.stages[p - 1].columns,
        };
        self.stages[position].columns.saturating_sub(before)
    }

    /// Final column count, label included
    pub fn final_columns(&self) -> usize {
        self.stages.last().map(|s| s.columns).unwrap_or(self.initial_columns)
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("PIPELINE SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Rows").add_attribute(Attribute::Bold),
            Cell::new("Columns").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("📁 Raw input"),
            Cell::new(self.initial_rows),
            Cell::new(self.initial_columns),
            Cell::new("-"),
        ]);

        let mut previous_rows = self.initial_rows;
        for record in &self.stages {
            let rows_cell = Cell::new(record.rows).fg(if record.rows < previous_rows {
                Color::Yellow
            } else {
                Color::White
            });
            table.add_row(vec![
                Cell::new(record.stage.title()),
                rows_cell,
                Cell::new(record.columns),
                Cell::new(format!("{} ms", record.elapsed_ms)),
            ]);
            previous_rows = record.rows;
        }

        // Indent the table
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        let mut outcome = Table::new();
        outcome.load_preset(UTF8_FULL_CONDENSED);
        outcome.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
        outcome.add_row(vec![
            Cell::new("🎯 Churn rate"),
            Cell::new(format!("{:.2}%", self.churn_rate * 100.0)).fg(Color::Cyan),
        ]);
        outcome.add_row(vec![
            Cell::new("🧩 Imputed columns"),
            Cell::new(self.imputed_columns),
        ]);
        outcome.add_row(vec![
            Cell::new("🏋️  Train rows"),
            Cell::new(format!(
                "{} ({:.2}% churn)",
                self.train_rows,
                self.train_positive_rate * 100.0
            )),
        ]);
        outcome.add_row(vec![
            Cell::new("🧪 Test rows"),
            Cell::new(format!(
                "{} ({:.2}% churn)",
                self.test_rows,
                self.test_positive_rate * 100.0
            )),
        ]);
        outcome.add_row(vec![
            Cell::new("✅ Final columns"),
            Cell::new(self.final_columns())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);

        println!();
        for line in outcome.to_string().lines() {
            println!("    {}", line);
        }

        // Show dropped columns if any
        let groups = [
            ("Identifier / Date", &self.dropped_id_date),
            ("High Missing Values", &self.dropped_sparse),
            ("Outcome Month", &self.dropped_outcome),
        ];
        if groups.iter().any(|(_, cols)| !cols.is_empty()) {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("DROPPED COLUMNS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());

            for (title, columns) in groups {
                if columns.is_empty() {
                    continue;
                }
                println!();
                println!(
                    "      {} {}:",
                    style(title).yellow(),
                    style(format!("({})", columns.len())).dim()
                );
                for column in columns {
                    println!("        {} {}", style("•").dim(), column);
                }
            }
        }
    }
}
