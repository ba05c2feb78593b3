use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser};

/// Process-wide options a sweep reads once, from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct InvocationOptions {
    /// Run without asking for confirmation.
    #[arg(short = 'Y', long = "yes", env = "SWEEP_YES")]
    pub yes: bool,

    /// Run the test list instead of the training list.
    #[arg(short = 'T', long, env = "SWEEP_TEST_MODE")]
    pub test_mode: bool,

    /// GPU to run on. Prompted for once per sweep when unset.
    #[arg(long, env = "SWEEP_GPU")]
    pub gpu: Option<String>,

    /// Output directory handed to every run.
    #[arg(long, env = "SWEEP_OUTPUT", default_value = "output")]
    pub output: PathBuf,

    /// Debug mode. Skips the confirmation prompt.
    #[arg(long, env = "SWEEP_DEBUG")]
    pub debug: bool,

    /// Tell runs not to reach the network.
    #[arg(long, env = "SWEEP_OFFLINE")]
    pub offline: bool,
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self {
            yes: false,
            test_mode: false,
            gpu: None,
            output: PathBuf::from("output"),
            debug: false,
            offline: false,
        }
    }
}

/// Picks the runner's options out of a command line that may carry others.
#[derive(Parser, Debug)]
#[command(ignore_errors = true, disable_help_flag = true, disable_version_flag = true)]
struct KnownArgs {
    #[command(flatten)]
    options: InvocationOptions,
}

const SWITCHES: &[&str] = &["-Y", "--yes", "-T", "--test-mode", "--debug", "--offline"];
const VALUED: &[&str] = &["--gpu", "--output"];
const SHORT_SWITCHES: &str = "YT";

/// Keep only the runner's own flags (and their values) out of `args`.
///
/// The first argument is the program name and is always kept. Scanning stops
/// at `--`.
fn known_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut known: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            continue;
        };
        if text == "--" {
            break;
        }

        let is_short_group = text.len() > 1
            && text.starts_with('-')
            && !text.starts_with("--")
            && text[1..].chars().all(|c| SHORT_SWITCHES.contains(c));

        if SWITCHES.contains(&text) || is_short_group {
            known.push(arg);
        } else if VALUED.contains(&text) {
            known.push(arg);
            if let Some(value) = args.next() {
                known.push(value);
            }
        } else if VALUED
            .iter()
            .any(|flag| text.starts_with(flag) && text[flag.len()..].starts_with('='))
        {
            known.push(arg);
        }
    }
    known
}

impl InvocationOptions {
    /// Read options from this process's arguments and environment.
    ///
    /// Arguments the runner does not know about are left to the caller.
    pub fn from_process_args() -> Self {
        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        KnownArgs::parse_from(known_args(args)).options
    }
}

/// sweep — expand a hyperparameter grid and run a command for every config.
#[derive(Parser, Debug)]
#[command(name = "sweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the sweep YAML file.
    pub sweep_file: PathBuf,

    #[command(flatten)]
    pub options: InvocationOptions,

    /// Directory run directories are created under.
    #[arg(long, env = "SWEEP_LOG_DIR", default_value = "output")]
    pub log_dir: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Program (and arguments) to run for every config, after `--`.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}
