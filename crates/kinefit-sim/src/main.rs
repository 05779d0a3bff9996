use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    fit::{self, FitArgs},
    synth::{self, SynthArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "kinefit-sim", about = "Kinematic cube synthesis and fitting CLI")]
struct Cli {
    /// Log per-iteration sampler progress.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic cube from true galaxy parameters.
    Synth(SynthArgs),
    /// Fit a cube under a YAML configuration and write the run artefacts.
    Fit(FitArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Synth(args) => synth::run(&args),
        Command::Fit(args) => fit::run(&args, cli.verbose),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
