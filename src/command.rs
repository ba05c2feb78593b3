use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use anyhow::{bail, Context};
use serde_json::Value;
use tracing::debug;

use crate::config::{RunConfig, RunResult};
use crate::error::{Result, SweepError};

/// A program spawned once per config, reporting its result as JSON on stdout.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SweepError::InvalidInput("no command given".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Spawn the program for `config` and wait for its result.
    ///
    /// Stdout is echoed line by line. The last line holding a JSON object is
    /// the result.
    pub fn run(&self, is_training: bool, config: &RunConfig) -> anyhow::Result<RunResult> {
        let map = config.to_map();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("SWEEP_CONFIG", Value::Object(map).to_string())
            .env("SWEEP_TAG", &config.tag)
            .env("SWEEP_RUN_ID", &config.run_id)
            .env("SWEEP_TRAINING", if is_training { "1" } else { "0" })
            .stdout(Stdio::piped());
        if let Some(gpu) = &config.gpu {
            cmd.env("CUDA_VISIBLE_DEVICES", gpu);
        }

        debug!(program = %self.program, tag = %config.tag, "spawning run");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;

        let mut result = None;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line.context("failed to read run output")?;
                println!("{}", line);
                if let Some(parsed) = parse_result_line(&line) {
                    result = Some(parsed);
                }
            }
        }

        let status = child.wait().context("failed to wait for run")?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        match result {
            Some(result) => Ok(result),
            None => bail!("{} printed no JSON result line", self.program),
        }
    }
}

/// A stdout line that is a JSON object, if it is one.
pub fn parse_result_line(line: &str) -> Option<RunResult> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sh(script: &str) -> ExternalCommand {
        ExternalCommand::new(&["sh".to_string(), "-c".to_string(), script.to_string()]).unwrap()
    }

    fn config() -> RunConfig {
        let mut config = RunConfig::new(json!({"lr": 0.1}).as_object().cloned().unwrap(), 0);
        config.tag = "Run-lr#0.1".to_string();
        config.run_id = "RUN_1".to_string();
        config.gpu = Some("2".to_string());
        config
    }

    #[test]
    fn test_parse_result_line() {
        assert_eq!(
            parse_result_line(r#"  {"acc": 0.5} "#).unwrap()["acc"],
            json!(0.5)
        );
        assert!(parse_result_line("epoch 1 done").is_none());
        assert!(parse_result_line("{not json").is_none());
        assert!(parse_result_line("[1, 2]").is_none());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            ExternalCommand::new(&[]),
            Err(SweepError::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_last_json_line_wins() {
        let cmd = sh(r#"echo '{"acc": 0.1}'; echo training; echo '{"acc": 0.9}'"#);
        let result = cmd.run(true, &config()).unwrap();
        assert_eq!(result["acc"], json!(0.9));
    }

    #[cfg(unix)]
    #[test]
    fn test_environment_passed() {
        let cmd = sh(
            r#"printf '{"tag":"%s","run":"%s","train":"%s","gpu":"%s"}\n' "$SWEEP_TAG" "$SWEEP_RUN_ID" "$SWEEP_TRAINING" "$CUDA_VISIBLE_DEVICES""#,
        );
        let result = cmd.run(false, &config()).unwrap();
        assert_eq!(result["tag"], json!("Run-lr#0.1"));
        assert_eq!(result["run"], json!("RUN_1"));
        assert_eq!(result["train"], json!("0"));
        assert_eq!(result["gpu"], json!("2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failures() {
        assert!(sh(r#"echo '{"acc": 1}'; exit 3"#).run(true, &config()).is_err());
        assert!(sh("echo no result").run(true, &config()).is_err());
    }
}
