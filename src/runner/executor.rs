use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use strsim::jaro_winkler;
use tracing::{error, info, warn};

use crate::config::{RunConfig, RunResult, RunStatus};
use crate::error::{Result, SweepError};
use crate::interface::console;
use crate::runner::interrupt::{InterruptOutcome, Interrupts};

/// Default pause after a failed run before the next one starts.
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(3);

/// Tags that under-performed earlier in the sweep. Only ever grows.
#[derive(Debug, Clone, Default)]
pub struct SkipSet {
    tags: HashSet<String>,
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: &str) -> bool {
        self.tags.insert(tag.to_string())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Runs one config at a time with failure isolation and early skipping.
#[derive(Debug, Clone)]
pub struct RunExecutor {
    pub prefix: String,
    pub is_training: bool,
    pub main_metric: Option<String>,
    pub skip_threshold: Option<f64>,
    pub grace: Duration,
    pub error_cooldown: Duration,
    pub interrupts: Interrupts,
}

impl RunExecutor {
    pub fn new(prefix: &str, interrupts: Interrupts) -> Self {
        Self {
            prefix: prefix.to_string(),
            is_training: true,
            main_metric: None,
            skip_threshold: None,
            grace: super::interrupt::DEFAULT_GRACE,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
            interrupts,
        }
    }

    /// Execute `config` and report its result and status.
    ///
    /// Never fails because of the run function itself: errors, panics,
    /// single interrupts and under-threshold results are all turned into a
    /// status. The only error is `SweepError::Shutdown`, returned when a second
    /// interrupt lands during the run or its grace countdown.
    ///
    /// A run interrupted once is `interrupted` only when it was cut short
    /// (returned an error or panicked). One that still returns a result is
    /// `done`.
    pub fn execute<F>(
        &self,
        func: &mut F,
        config: &RunConfig,
        skip_set: &mut SkipSet,
    ) -> Result<(RunResult, RunStatus)>
    where
        F: FnMut(bool, &RunConfig) -> anyhow::Result<RunResult>,
    {
        if skip_set.contains(&config.tag) {
            println!("{} Skip! {} is in the skip list", config.tag, config.tag);
            info!(tag = %config.tag, "skipped");
            return Ok((RunResult::new(), RunStatus::Skip));
        }

        let mark = self.interrupts.begin_run();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| func(self.is_training, config)));
        self.interrupts.end_run();

        let interrupts = self.interrupts.count_since(mark);
        if interrupts > 1 {
            console::error(&self.prefix, "Shutdown by user!");
            warn!(tag = %config.tag, interrupts, "interrupted twice during run");
            return Err(SweepError::Shutdown);
        }
        if interrupts == 1 {
            console::error(&self.prefix, "Interrupted by user!");
            if self.interrupts.grace_countdown(self.grace) == InterruptOutcome::Fatal {
                console::error(&self.prefix, "Shutdown by user!");
                return Err(SweepError::Shutdown);
            }
            // A run that finished on its own keeps its result.
            if !matches!(outcome, Ok(Ok(_))) {
                warn!(tag = %config.tag, "interrupted");
                return Ok((RunResult::new(), RunStatus::Interrupted));
            }
            info!(tag = %config.tag, "run completed despite interrupt");
        }

        let failure = match outcome {
            Ok(Ok(mut result)) => {
                result.insert("tag".to_string(), Value::from(config.tag.clone()));
                println!("{} Done!", config.tag);
                info!(tag = %config.tag, cid = config.cid, "run finished");
                self.apply_threshold(&config.tag, &result, skip_set);
                return Ok((result, RunStatus::Done));
            }
            Ok(Err(e)) => format!("{:?}", e),
            Err(payload) => panic_message(payload.as_ref()),
        };

        console::error(&self.prefix, &failure);
        console::error(
            &self.prefix,
            &format!("Running error in {}, continuing...", config.tag),
        );
        error!(tag = %config.tag, cid = config.cid, error = %failure, "run failed");
        if !self.error_cooldown.is_zero() {
            thread::sleep(self.error_cooldown);
        }
        Ok((RunResult::new(), RunStatus::Error))
    }

    fn apply_threshold(&self, tag: &str, result: &RunResult, skip_set: &mut SkipSet) {
        let (Some(metric), Some(threshold)) = (&self.main_metric, self.skip_threshold) else {
            return;
        };

        match result.get(metric).and_then(Value::as_f64) {
            Some(value) if value < threshold => {
                skip_set.insert(tag);
                println!(
                    "{} {} {}={} < {}",
                    tag,
                    ::console::style("Skip!").red(),
                    metric,
                    value,
                    threshold
                );
                warn!(tag, metric = %metric, value, threshold, "below threshold, skipping tag");
            }
            Some(_) => {}
            None => {
                let hint = closest_key(metric, result)
                    .map(|k| format!(" (did you mean '{}'?)", k))
                    .unwrap_or_default();
                warn!(tag, metric = %metric, "main metric missing from result{}", hint);
            }
        }
    }
}

/// Result key that looks like a misspelling of `metric`.
fn closest_key<'a>(metric: &str, result: &'a RunResult) -> Option<&'a str> {
    result
        .keys()
        .filter(|k| k.as_str() != "tag")
        .map(|k| (k.as_str(), jaro_winkler(&k.to_lowercase(), &metric.to_lowercase())))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(k, _)| k)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
