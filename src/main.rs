use clap::Parser;
use std::path::Path;

use sweep_runner::cli::Cli;
use sweep_runner::command::ExternalCommand;
use sweep_runner::config::{RunConfig, SweepFile};
use sweep_runner::error::{Result, SweepError};
use sweep_runner::logging;
use sweep_runner::runner::{Runner, EXIT_INTERRUPTED};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) | Err(SweepError::Cancelled) => {}
        Err(SweepError::Shutdown) => {
            eprintln!("Error: {}", SweepError::Shutdown);
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let sweep = SweepFile::load(&cli.sweep_file)?;
    let base_dir = cli
        .sweep_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let command = ExternalCommand::new(&cli.command)?;
    let config = sweep.runner_config(&base_dir, &cli.log_dir)?;
    let mut runner = Runner::new(config, cli.options)?;

    for spec in &sweep.train {
        runner.add(spec);
    }
    for spec in &sweep.test {
        runner.add_test(spec);
    }

    runner.run(
        |is_training: bool, config: &RunConfig| command.run(is_training, config),
        sweep.run_options(),
    )
}
