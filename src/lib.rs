//! churnprep: churn feature-engineering library
//!
//! Prepares a four-month telecom usage table for churn modelling: missing
//! value treatment, high-value subscriber selection, churn labelling, delta
//! features, outlier capping, a stratified split and target encoding.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;
