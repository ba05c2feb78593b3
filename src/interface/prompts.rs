use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::process::Command;

use dialoguer::Input;

use crate::error::{Result, SweepError};

/// GPU indices the selection prompt accepts.
pub const GPU_CHOICES: RangeInclusive<u32> = 0..=3;

/// Operator answer to the pre-run confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confirmation {
    Proceed,
    /// Resume from this position in the run list.
    StartAt(usize),
    /// Proceed, skipping tags whose main metric falls below this value.
    SkipThreshold(f64),
    Cancel,
}

/// Interpret one line typed at the confirmation prompt.
///
/// Empty, `y` and `Y` proceed. Integers are resume positions, fractions in
/// `[0, 1)` are skip thresholds. Anything else cancels.
pub fn parse_confirmation(input: &str) -> Confirmation {
    let input = input.trim();
    if input.is_empty() || input == "y" || input == "Y" {
        return Confirmation::Proceed;
    }
    if let Ok(index) = input.parse::<usize>() {
        return Confirmation::StartAt(index);
    }
    match input.parse::<f64>() {
        Ok(value) if (0.0..1.0).contains(&value) => Confirmation::SkipThreshold(value),
        _ => Confirmation::Cancel,
    }
}

/// Blocking operator input used by the runner.
pub trait Prompter {
    /// Read one line of free text.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Ask which GPU to run on.
    fn select_gpu(&mut self, choices: RangeInclusive<u32>) -> Result<String>;
}

/// Interactive prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let input: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(input)
    }

    fn select_gpu(&mut self, choices: RangeInclusive<u32>) -> Result<String> {
        show_gpu_status();

        let (low, high) = (*choices.start(), *choices.end());
        let input: String = Input::new()
            .with_prompt("Select GPU")
            .validate_with(move |value: &String| -> std::result::Result<(), String> {
                match value.trim().parse::<u32>() {
                    Ok(gpu) if (low..=high).contains(&gpu) => Ok(()),
                    _ => Err(format!("Enter a GPU index between {} and {}", low, high)),
                }
            })
            .interact_text()?;

        let gpu = input.trim().to_string();
        println!("This sweep will use GPU {}", gpu);
        Ok(gpu)
    }
}

/// Print `gpustat` output when the tool is installed.
fn show_gpu_status() {
    match Command::new("gpustat").status() {
        Ok(_) => {}
        Err(_) => println!("Install gpustat to see GPU status here: pip install gpustat"),
    }
}

/// Pre-recorded answers, for non-interactive use and tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    lines: VecDeque<String>,
    gpus: VecDeque<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(mut self, answer: &str) -> Self {
        self.lines.push_back(answer.to_string());
        self
    }

    pub fn gpu(mut self, answer: &str) -> Self {
        self.gpus.push_back(answer.to_string());
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, _prompt: &str) -> Result<String> {
        self.lines
            .pop_front()
            .ok_or_else(|| SweepError::InvalidInput("no scripted answer left".to_string()))
    }

    fn select_gpu(&mut self, choices: RangeInclusive<u32>) -> Result<String> {
        let answer = self
            .gpus
            .pop_front()
            .ok_or_else(|| SweepError::InvalidInput("no scripted GPU left".to_string()))?;
        match answer.trim().parse::<u32>() {
            Ok(gpu) if choices.contains(&gpu) => Ok(answer.trim().to_string()),
            _ => Err(SweepError::InvalidInput(format!(
                "cannot run on GPU '{}'",
                answer
            ))),
        }
    }
}
