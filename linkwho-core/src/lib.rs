pub mod config;
pub mod error;
pub mod input;
pub mod report;
pub mod run;
pub mod sink;

pub use config::{OutputPaths, RunConfig};
pub use error::CoreError;
pub use report::RunSummary;
pub use run::{RunProgressCallback, execute_run};
