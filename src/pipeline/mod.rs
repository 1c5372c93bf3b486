//! Pipeline module - the feature-engineering stages and their runner

pub mod churn;
pub mod config;
pub mod delta;
pub mod encoding;
pub(crate) mod frame;
pub mod high_value;
pub mod loader;
pub mod mice;
pub mod missing;
pub mod outliers;
pub mod runner;
pub mod schema;
pub mod split;

pub use churn::*;
pub use config::*;
pub use delta::*;
pub use encoding::*;
pub use high_value::*;
pub use loader::*;
pub use mice::{impute_chained, ChainedOutcome};
pub use missing::*;
pub use outliers::*;
pub use runner::*;
pub use schema::*;
pub use split::*;
