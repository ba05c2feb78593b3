pub mod cli;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod runner;

pub use cli::InvocationOptions;
pub use config::{ConfigSpec, ParamMap, RunConfig, RunResult, RunStatus};
pub use error::{Result, SweepError};
pub use report::Report;
pub use runner::{RunOptions, Runner, RunnerConfig};
