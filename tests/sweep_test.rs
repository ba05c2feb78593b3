use std::fs;
use std::time::Duration;

use anyhow::bail;
use serde_json::{json, Value};
use sweep_runner::config::{ConfigSpec, RunConfig, RunResult, RunStatus};
use sweep_runner::interface::ScriptedPrompter;
use sweep_runner::report::{PARSED_RESULTS_FILE, RAW_RESULTS_FILE, TABLE_CSV_FILE, TABLE_FILE};
use sweep_runner::runner::{Interrupts, RunOptions, Runner, RunnerConfig};
use sweep_runner::{InvocationOptions, SweepError};
use tempfile::TempDir;

fn spec(value: Value) -> ConfigSpec {
    value.as_object().cloned().unwrap()
}

fn metric(name: &str, value: f64) -> RunResult {
    let mut result = RunResult::new();
    result.insert(name.to_string(), json!(value));
    result
}

fn options() -> InvocationOptions {
    InvocationOptions {
        gpu: Some("0".to_string()),
        ..InvocationOptions::default()
    }
}

fn runner(dir: &TempDir, block: &[&str], options: InvocationOptions) -> Runner {
    let config = RunnerConfig {
        name: "Sweep".to_string(),
        run_id: Some("RUN_TEST".to_string()),
        log_dir: dir.path().to_path_buf(),
        block: block.iter().map(|s| s.to_string()).collect(),
        grace: Duration::ZERO,
        error_cooldown: Duration::ZERO,
        ..RunnerConfig::default()
    };
    Runner::new(config, options)
        .unwrap()
        .with_interrupts(Interrupts::detached())
}

fn accuracy(config: &RunConfig) -> f64 {
    match config.get_str("model") {
        Some("a") => 1.0,
        _ => 0.0,
    }
}

#[test]
fn test_seeds_are_grouped_into_one_row() {
    let dir = TempDir::new().unwrap();
    let mut runner =
        runner(&dir, &["seed"], options()).with_prompter(ScriptedPrompter::new().line("y"));
    runner.add(&spec(json!({"model": ["a", "b"], "seed": [1, 2]})));

    runner
        .run(
            |is_training: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                assert!(is_training);
                Ok(metric("acc", accuracy(config)))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert!(runner.succeeded());
    assert_eq!(runner.results().len(), 4);

    let report = runner.report().unwrap();
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.columns, vec!["tag", "acc"]);

    let a = report.group("Sweep-model#a").unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a.field("acc"), "100.0±0.0");
    let b = report.group("Sweep-model#b").unwrap();
    assert_eq!(b.len(), 2);
    assert_eq!(b.field("acc"), "0.0±0.0");

    for file in [RAW_RESULTS_FILE, TABLE_FILE, TABLE_CSV_FILE, PARSED_RESULTS_FILE] {
        assert!(runner.run_dir().join(file).is_file(), "{} missing", file);
    }
    let table = fs::read_to_string(runner.run_dir().join(TABLE_FILE)).unwrap();
    assert!(table.contains("Sweep-model#a (2)"));
}

#[test]
fn test_config_fields_are_injected() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        offline: true,
        ..options()
    };
    let mut runner = runner(&dir, &["seed"], options);
    runner.add(&spec(json!({"model": "a", "seed": [3]})));

    let mut seen = Vec::new();
    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                seen.push(config.to_map());
                Ok(metric("acc", 1.0))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(seen.len(), 1);
    let map = &seen[0];
    assert_eq!(map["tag"], json!("Sweep-model#a"));
    assert_eq!(map["run_id"], json!("RUN_TEST"));
    assert_eq!(map["gpu"], json!("0"));
    assert_eq!(map["offline"], json!(true));
    assert_eq!(map["cid"], json!(0));
    assert_eq!(runner.configs()[0].display_name, "-SEED@3");
}

#[test]
fn test_cancel_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let mut runner = runner(&dir, &[], options()).with_prompter(ScriptedPrompter::new().line("n"));
    runner.add(&spec(json!({"lr": [0.1, 0.2]})));

    let mut calls = 0;
    let outcome = runner.run(
        |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> {
            calls += 1;
            Ok(RunResult::new())
        },
        RunOptions::default(),
    );

    assert!(matches!(outcome, Err(SweepError::Cancelled)));
    assert_eq!(calls, 0);
    assert!(!runner.succeeded());
    assert_eq!(fs::read_dir(runner.run_dir()).unwrap().count(), 0);
}

#[test]
fn test_start_index_from_prompt() {
    let dir = TempDir::new().unwrap();
    let mut runner = runner(&dir, &[], options()).with_prompter(ScriptedPrompter::new().line("2"));
    runner.add(&spec(json!({"lr": [1, 2, 3, 4]})));

    let mut seen = Vec::new();
    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                seen.push(config.get_f64("lr").unwrap());
                Ok(metric("acc", 0.5))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(seen, vec![3.0, 4.0]);
    assert_eq!(runner.configs()[0].status, RunStatus::Pending);
    assert_eq!(runner.configs()[3].status, RunStatus::Done);
}

#[test]
fn test_out_of_range_start_cancels() {
    let dir = TempDir::new().unwrap();
    let mut runner = runner(&dir, &[], options()).with_prompter(ScriptedPrompter::new().line("9"));
    runner.add(&spec(json!({"lr": [1, 2]})));

    let outcome = runner.run(
        |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> { Ok(RunResult::new()) },
        RunOptions::default(),
    );
    assert!(matches!(outcome, Err(SweepError::Cancelled)));
}

#[test]
fn test_failing_run_is_contained() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        debug: true,
        ..options()
    };
    let mut runner = runner(&dir, &[], options);
    runner.add(&spec(json!({"lr": [1, 2, 3]})));

    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                if config.cid == 1 {
                    bail!("diverged");
                }
                Ok(metric("acc", 0.5))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(runner.results().len(), 2);
    let statuses: Vec<RunStatus> = runner.configs().iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Done, RunStatus::Error, RunStatus::Done]
    );
    assert_eq!(runner.report().unwrap().groups.len(), 2);
}

#[test]
fn test_panicking_run_is_contained() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let mut runner = runner(&dir, &[], options);
    runner.add(&spec(json!({"lr": [1, 2]})));

    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                if config.cid == 0 {
                    panic!("out of memory");
                }
                Ok(metric("acc", 0.5))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(runner.results().len(), 1);
    assert_eq!(runner.configs()[0].status, RunStatus::Error);
}

#[test]
fn test_skip_threshold_skips_weak_tags() {
    let dir = TempDir::new().unwrap();
    let mut runner =
        runner(&dir, &["seed"], options()).with_prompter(ScriptedPrompter::new().line("0.5"));
    runner.add(&spec(json!({"seed": [1, 2], "model": ["a", "b"]})));

    let mut calls = 0;
    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                calls += 1;
                let acc = if config.get_str("model") == Some("a") { 0.1 } else { 0.9 };
                Ok(metric("acc", acc))
            },
            RunOptions {
                main_metric: Some("acc".to_string()),
                ..RunOptions::default()
            },
        )
        .unwrap();

    assert_eq!(calls, 3);
    assert_eq!(runner.results().len(), 3);
    assert!(runner.skip_set().contains("Sweep-model#a"));
    let statuses: Vec<RunStatus> = runner.configs().iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            RunStatus::Done,
            RunStatus::Done,
            RunStatus::Skip,
            RunStatus::Done
        ]
    );
}

#[test]
fn test_best_first_keeps_feeding_the_leader() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let mut runner = runner(&dir, &["seed"], options);
    runner.add(&spec(json!({"seed": [1, 2], "model": ["a", "b"]})));

    let mut order = Vec::new();
    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                order.push((
                    config.get_str("model").unwrap_or_default().to_string(),
                    config.seed(),
                ));
                Ok(metric("acc", 0.5))
            },
            RunOptions {
                main_metric: Some("acc".to_string()),
                best_first: true,
                ..RunOptions::default()
            },
        )
        .unwrap();

    let expected = vec![
        ("a".to_string(), 1.0),
        ("a".to_string(), 2.0),
        ("b".to_string(), 1.0),
        ("b".to_string(), 2.0),
    ];
    assert_eq!(order, expected);
    assert_eq!(runner.results().len(), 4);
}

#[test]
fn test_sort_by_seed() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let mut runner = runner(&dir, &["seed"], options);
    runner.add(&spec(json!({"model": ["a", "b"], "seed": [2, 1]})));

    let mut seeds = Vec::new();
    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                seeds.push(config.seed());
                Ok(metric("acc", 1.0))
            },
            RunOptions {
                sort_by_seed: true,
                ..RunOptions::default()
            },
        )
        .unwrap();

    assert_eq!(seeds, vec![1.0, 1.0, 2.0, 2.0]);
    let models: Vec<&str> = runner
        .configs()
        .iter()
        .filter_map(|c| c.get_str("model"))
        .collect();
    assert_eq!(models, vec!["a", "b", "a", "b"]);
}

#[test]
fn test_interrupted_run_continues() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let interrupts = Interrupts::detached();
    let mut runner = runner(&dir, &[], options).with_interrupts(interrupts.clone());
    runner.add(&spec(json!({"lr": [1, 2]})));

    runner
        .run(
            |_: bool, config: &RunConfig| -> anyhow::Result<RunResult> {
                if config.cid == 0 {
                    interrupts.raise();
                    bail!("stopped on interrupt");
                }
                Ok(metric("acc", 0.5))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(runner.configs()[0].status, RunStatus::Interrupted);
    assert_eq!(runner.configs()[1].status, RunStatus::Done);
    assert_eq!(runner.results().len(), 1);
}

#[test]
fn test_double_interrupt_shuts_down() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let interrupts = Interrupts::detached();
    let mut runner = runner(&dir, &[], options).with_interrupts(interrupts.clone());
    runner.add(&spec(json!({"lr": [1, 2]})));

    let mut calls = 0;
    let outcome = runner.run(
        |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> {
            calls += 1;
            interrupts.raise();
            interrupts.raise();
            Ok(metric("acc", 0.9))
        },
        RunOptions::default(),
    );

    assert!(matches!(outcome, Err(SweepError::Shutdown)));
    assert_eq!(calls, 1);
    assert!(!runner.succeeded());
    assert!(!interrupts.is_running());
}

#[test]
fn test_test_mode_uses_checkpoint_tag() {
    let dir = TempDir::new().unwrap();
    let ckpt = dir.path().join("ckpt");
    fs::create_dir_all(&ckpt).unwrap();
    fs::write(ckpt.join("config.yaml"), "tag: Train-model#a\nlr: 0.1\n").unwrap();

    let options = InvocationOptions {
        yes: true,
        test_mode: true,
        ..options()
    };
    let mut runner = runner(&dir, &["test_from_ckpt"], options);
    runner.add(&spec(json!({"model": "ignored"})));
    runner.add_test(&spec(json!({
        "test_from_ckpt": ckpt.to_string_lossy(),
        "split": ["val", "test"],
    })));

    let mut modes = Vec::new();
    runner
        .run(
            |is_training: bool, _: &RunConfig| -> anyhow::Result<RunResult> {
                modes.push(is_training);
                Ok(metric("acc", 0.5))
            },
            RunOptions::default(),
        )
        .unwrap();

    assert_eq!(modes, vec![false, false]);
    let report = runner.report().unwrap();
    assert!(report.group("Train-model#a-split#val").is_some());
    assert!(report.group("Train-model#a-split#test").is_some());
}

#[test]
fn test_empty_list_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut runner = runner(&dir, &[], options());
    runner.add_test(&spec(json!({"split": "val"})));

    runner
        .run(
            |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> { Ok(RunResult::new()) },
            RunOptions::default(),
        )
        .unwrap();
    assert!(runner.report().is_none());
}

#[test]
fn test_second_run_requires_reset() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let mut runner = runner(&dir, &[], options);
    runner.add(&spec(json!({"lr": [1, 2]})));

    let func = |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> { Ok(metric("acc", 0.5)) };
    runner.run(func, RunOptions::default()).unwrap();

    let again = runner.run(func, RunOptions::default());
    assert!(matches!(again, Err(SweepError::Configuration(_))));

    runner.reset();
    assert!(runner.results().is_empty());
    runner.run(func, RunOptions::default()).unwrap();
    assert_eq!(runner.results().len(), 2);
}

#[test]
fn test_empty_results_report() {
    let dir = TempDir::new().unwrap();
    let options = InvocationOptions {
        yes: true,
        ..options()
    };
    let mut runner = runner(&dir, &[], options);
    runner.add(&spec(json!({"lr": 1})));

    runner
        .run(
            |_: bool, _: &RunConfig| -> anyhow::Result<RunResult> { bail!("always fails") },
            RunOptions::default(),
        )
        .unwrap();

    assert!(runner.report().unwrap().is_empty());
    let table = fs::read_to_string(runner.run_dir().join(TABLE_FILE)).unwrap();
    assert_eq!(table.trim(), "No results.");
}
