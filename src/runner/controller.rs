use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthStr;

use crate::cli::InvocationOptions;
use crate::clock::{file_time, human_time};
use crate::config::{
    expand, load_checkpoint_tag, resolve_checkpoint_path, ConfigSpec, NamingIndex, ParamMap,
    RunConfig, RunResult, RunStatus, TagGenerator, CHECKPOINT_KEY,
};
use crate::error::{Result, SweepError};
use crate::interface::console;
use crate::interface::{parse_confirmation, Confirmation, Prompter, TerminalPrompter, GPU_CHOICES};
use crate::report::{aggregate, create_run_dir, persist, render_table, Report};
use crate::runner::executor::{RunExecutor, SkipSet, DEFAULT_ERROR_COOLDOWN};
use crate::runner::interrupt::{Interrupts, DEFAULT_GRACE};
use crate::runner::order::{OrderPolicy, Scheduler};

/// Construction parameters of a runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub name: String,
    /// Shared by every run of the sweep. Defaults to `RUN_<timestamp>`.
    pub run_id: Option<String>,
    pub log_dir: PathBuf,
    pub index: NamingIndex,
    /// Keys left out of tags. Results differing only in these are repeats.
    pub block: Vec<String>,
    pub grace: Duration,
    pub error_cooldown: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "Runner".to_string(),
            run_id: None,
            log_dir: PathBuf::from("output"),
            index: NamingIndex::new(),
            block: Vec::new(),
            grace: DEFAULT_GRACE,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
        }
    }
}

/// Per-sweep knobs passed to `Runner::run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Position in the run list to resume from.
    pub start_index: usize,
    /// Result field used for skipping and best-first ranking. Higher is better.
    pub main_metric: Option<String>,
    /// Tags whose main metric falls below this are skipped from then on.
    pub skip_threshold: Option<f64>,
    pub best_first: bool,
    /// Order the list by `seed` before running.
    pub sort_by_seed: bool,
    /// GPU for this sweep only, bypassing the cached selection.
    pub gpu: Option<String>,
}

/// Expands registered grids and runs them one config at a time.
pub struct Runner {
    name: String,
    run_id: String,
    run_dir: PathBuf,
    tags: TagGenerator,
    options: InvocationOptions,
    grace: Duration,
    error_cooldown: Duration,
    train_list: Vec<ParamMap>,
    test_list: Vec<ParamMap>,
    gpu: Option<String>,
    skip_set: SkipSet,
    configs: Vec<RunConfig>,
    results: Vec<RunResult>,
    report: Option<Report>,
    succeeded: bool,
    prompter: Box<dyn Prompter>,
    interrupts: Option<Interrupts>,
}

impl Runner {
    /// Create a runner and its run directory.
    pub fn new(config: RunnerConfig, options: InvocationOptions) -> Result<Self> {
        let run_id = config
            .run_id
            .unwrap_or_else(|| format!("RUN_{}", file_time()));
        let run_dir = create_run_dir(&config.log_dir, &config.name, &run_id)?;
        debug!(run_dir = %run_dir.display(), "created run directory");

        Ok(Self {
            tags: TagGenerator::new(config.index, config.block),
            name: config.name,
            run_id,
            run_dir,
            options,
            grace: config.grace,
            error_cooldown: config.error_cooldown,
            train_list: Vec::new(),
            test_list: Vec::new(),
            gpu: None,
            skip_set: SkipSet::new(),
            configs: Vec::new(),
            results: Vec::new(),
            report: None,
            succeeded: false,
            prompter: Box::new(TerminalPrompter),
            interrupts: None,
        })
    }

    /// Replace the terminal prompts, e.g. with scripted answers.
    pub fn with_prompter<P: Prompter + 'static>(mut self, prompter: P) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    /// Use this interrupt counter instead of installing the Ctrl+C handler.
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Register a training grid. Returns how many configs it expanded to.
    pub fn add(&mut self, spec: &ConfigSpec) -> usize {
        let configs = expand(spec);
        let added = configs.len();
        self.train_list.extend(configs);
        added
    }

    /// Register a test grid. Returns how many configs it expanded to.
    pub fn add_test(&mut self, spec: &ConfigSpec) -> usize {
        let configs = expand(spec);
        let added = configs.len();
        self.test_list.extend(configs);
        added
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn train_list(&self) -> &[ParamMap] {
        &self.train_list
    }

    pub fn test_list(&self) -> &[ParamMap] {
        &self.test_list
    }

    /// Resolved configs of the last sweep, with their final status.
    pub fn configs(&self) -> &[RunConfig] {
        &self.configs
    }

    /// Results of `done` runs, in completion order.
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    pub fn skip_set(&self) -> &SkipSet {
        &self.skip_set
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// The interrupt counter in use, for run functions that poll it.
    pub fn interrupts(&self) -> Option<&Interrupts> {
        self.interrupts.as_ref()
    }

    /// Forget everything from the previous sweep so `run` can be called again.
    pub fn reset(&mut self) {
        self.gpu = None;
        self.skip_set = SkipSet::new();
        self.configs.clear();
        self.results.clear();
        self.report = None;
        self.succeeded = false;
    }

    fn active_list(&self) -> &[ParamMap] {
        if self.options.test_mode {
            &self.test_list
        } else {
            &self.train_list
        }
    }

    /// GPU for this sweep: explicit override, cached choice, flag, or prompt.
    fn resolve_gpu(&mut self, explicit: Option<&str>) -> Result<String> {
        if let Some(gpu) = explicit {
            return Ok(gpu.to_string());
        }
        if let Some(gpu) = &self.gpu {
            return Ok(gpu.clone());
        }
        let gpu = match &self.options.gpu {
            Some(gpu) => gpu.clone(),
            None => self.prompter.select_gpu(GPU_CHOICES)?,
        };
        self.gpu = Some(gpu.clone());
        Ok(gpu)
    }

    /// Turn expanded parameters into a config ready to run.
    fn resolve_config(&self, params: ParamMap, cid: usize, gpu: &str) -> Result<RunConfig> {
        let mut config = RunConfig::new(params, cid);

        let prefix = if self.options.test_mode {
            let checkpoint = config.checkpoint().ok_or_else(|| SweepError::MissingCheckpoint {
                tag: self.tags.tag(&self.name, &config.params),
            })?;
            let path = resolve_checkpoint_path(Path::new(checkpoint));
            let tag = load_checkpoint_tag(&path)?;
            config.params.insert(
                CHECKPOINT_KEY.to_string(),
                Value::from(path.to_string_lossy().into_owned()),
            );
            tag
        } else {
            self.name.clone()
        };

        config.tag = self.tags.tag(&prefix, &config.params);
        config.display_name = self.tags.display_name(&config.params);
        config.run_id = config
            .own_run_id()
            .map(str::to_string)
            .unwrap_or_else(|| self.run_id.clone());
        config.gpu = Some(gpu.to_string());
        config.output = self.options.output.clone();
        config.debug = self.options.debug;
        config.offline = self.options.offline;
        Ok(config)
    }

    /// Warn when different parameter sets end up with the same tag.
    fn check_collisions(&self, configs: &[RunConfig]) {
        let mut seen: HashMap<&str, String> = HashMap::new();
        for config in configs {
            let identity = self.tags.identity(&config.params);
            match seen.get(config.tag.as_str()) {
                Some(existing) if *existing != identity => {
                    console::warning(
                        &self.name,
                        &format!(
                            "Tag {} is shared by different parameters; their results will be grouped",
                            config.tag
                        ),
                    );
                    warn!(tag = %config.tag, "tag collision between distinct parameters");
                }
                Some(_) => {}
                None => {
                    seen.insert(&config.tag, identity);
                }
            }
        }
    }

    /// Ask the operator to confirm. Returns the start index and threshold.
    fn confirm(
        &mut self,
        total: usize,
        start: usize,
        threshold: Option<f64>,
        has_metric: bool,
    ) -> Result<(usize, Option<f64>)> {
        if self.options.debug || self.options.yes {
            return Ok((start, threshold));
        }

        let answer = self
            .prompter
            .read_line("Confirm to run? (y / start index / skip threshold)")?;
        match parse_confirmation(&answer) {
            Confirmation::Proceed => Ok((start, threshold)),
            Confirmation::StartAt(index) if index < total => Ok((index, threshold)),
            Confirmation::SkipThreshold(value) => {
                if !has_metric {
                    console::warning(
                        &self.name,
                        "Skip threshold given without a main metric, it will have no effect",
                    );
                }
                Ok((start, Some(value)))
            }
            Confirmation::StartAt(_) | Confirmation::Cancel => {
                console::error(&self.name, "Canceled!");
                Err(SweepError::Cancelled)
            }
        }
    }

    /// Run `func` over every config of the active list.
    ///
    /// `func` gets `is_training` (false in test mode) and the resolved config.
    /// Failing, panicking and interrupted runs are reported and skipped; only a
    /// configuration problem, a cancelled confirmation or a double interrupt
    /// make this return an error.
    pub fn run<F>(&mut self, mut func: F, options: RunOptions) -> Result<()>
    where
        F: FnMut(bool, &RunConfig) -> anyhow::Result<RunResult>,
    {
        if self.succeeded {
            return Err(SweepError::Configuration(
                "runner already finished a sweep, call reset() before running again".to_string(),
            ));
        }

        let mut params_list = self.active_list().to_vec();
        if params_list.is_empty() {
            console::warning(&self.name, "No configurations found");
            warn!(runner = %self.name, test_mode = self.options.test_mode, "nothing to run");
            return Ok(());
        }

        let gpu = self.resolve_gpu(options.gpu.as_deref())?;

        if options.sort_by_seed {
            params_list.sort_by(|a, b| {
                let seed = |p: &ParamMap| p.get("seed").and_then(Value::as_f64).unwrap_or(0.0);
                seed(a).partial_cmp(&seed(b)).unwrap_or(Ordering::Equal)
            });
        }

        let configs = params_list
            .into_iter()
            .enumerate()
            .map(|(cid, params)| self.resolve_config(params, cid, &gpu))
            .collect::<Result<Vec<_>>>()?;
        self.check_collisions(&configs);

        let preview: Vec<(String, String)> = configs
            .iter()
            .map(|c| (c.tag.clone(), c.display_name.clone()))
            .collect();
        console::print_preview(&self.name, &preview, options.start_index);

        let (start, threshold) = self.confirm(
            configs.len(),
            options.start_index,
            options.skip_threshold,
            options.main_metric.is_some(),
        )?;

        if start > 0 {
            console::info(
                &self.name,
                &format!("Resuming from {} of {}", start, configs.len()),
            );
        }

        let interrupts = match &self.interrupts {
            Some(interrupts) => interrupts.clone(),
            None => {
                let interrupts = Interrupts::install()?;
                self.interrupts = Some(interrupts.clone());
                interrupts
            }
        };

        let executor = RunExecutor {
            prefix: self.name.clone(),
            is_training: !self.options.test_mode,
            main_metric: options.main_metric.clone(),
            skip_threshold: threshold,
            grace: self.grace,
            error_cooldown: self.error_cooldown,
            interrupts,
        };

        let policy = if options.best_first {
            OrderPolicy::BestFirst
        } else {
            OrderPolicy::InOrder
        };
        let mut scheduler = Scheduler::new(
            policy,
            configs.iter().map(|c| c.tag.clone()).collect(),
            start,
        );

        info!(
            runner = %self.name,
            run_id = %self.run_id,
            configs = configs.len(),
            start,
            ?policy,
            "starting sweep"
        );

        self.configs = configs;
        let total = self.configs.len();
        let mut results = Vec::new();

        while let Some(i) = scheduler.next(&self.skip_set) {
            if policy == OrderPolicy::BestFirst {
                print_running_means(&scheduler);
            }

            let config = &mut self.configs[i];
            console::print_run_header(&human_time(), i, total, &config.tag);
            println!("{} Config:", config.tag);
            console::print_json(&config.to_map());

            let (result, status) = executor.execute(&mut func, config, &mut self.skip_set)?;
            config.status = status;
            if status != RunStatus::Done {
                continue;
            }

            println!("{} Result:", config.tag);
            console::print_json(&result);

            if let Some(value) = options
                .main_metric
                .as_deref()
                .and_then(|m| result.get(m))
                .and_then(Value::as_f64)
            {
                scheduler.record(&config.tag, value);
            }
            results.push(result);
        }

        self.finish(results)
    }

    fn finish(&mut self, results: Vec<RunResult>) -> Result<()> {
        let report = aggregate(&results)?;

        console::success(&self.name, &format!("All Done! {}", human_time()));
        println!("{}", render_table(&report));

        persist(&self.run_dir, &self.run_id, &results, &report)?;
        info!(
            runner = %self.name,
            results = results.len(),
            groups = report.groups.len(),
            run_dir = %self.run_dir.display(),
            "sweep finished"
        );

        self.results = results;
        self.report = Some(report);
        self.succeeded = true;
        Ok(())
    }
}

fn print_running_means(scheduler: &Scheduler) {
    let summary = scheduler.summary();
    if summary.is_empty() {
        return;
    }
    let width = summary.iter().map(|(tag, _, _)| tag.width()).max().unwrap_or(0);
    println!();
    println!("Running means ({} configs left):", scheduler.remaining() + 1);
    for (tag, mean, count) in summary {
        println!("  {:<width$}  {:.4}  (n={})", tag, mean, count, width = width);
    }
}
