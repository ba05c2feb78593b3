pub mod controller;
pub mod executor;
pub mod interrupt;
pub mod order;

pub use controller::{RunOptions, Runner, RunnerConfig};
pub use executor::{RunExecutor, SkipSet, DEFAULT_ERROR_COOLDOWN};
pub use interrupt::{InterruptOutcome, Interrupts, SignalAction, DEFAULT_GRACE, EXIT_INTERRUPTED};
pub use order::{OrderPolicy, Scheduler};
