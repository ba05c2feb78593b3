pub mod checkpoint;
pub mod expand;
pub mod run_config;
pub mod sweep_file;
pub mod tag;

pub use checkpoint::{load_checkpoint_tag, resolve_checkpoint_path, CHECKPOINT_CONFIG_FILE};
pub use expand::expand;
pub use run_config::{ConfigSpec, ParamMap, RunConfig, RunResult, RunStatus, CHECKPOINT_KEY};
pub use sweep_file::{IndexSource, SweepFile};
pub use tag::{format_value, Formatter, NamingIndex, TagGenerator};
