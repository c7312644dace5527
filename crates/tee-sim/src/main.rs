use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    artifacts::{self, ArtifactsArgs},
    launch::{self, LaunchArgs},
    ledger::{self, LedgerArgs},
    plan::{self, PlanArgs},
    version::{self, VersionArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tee-sim", about = "Keystone TEE on gem5 experiment launcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enumerate the experiment matrix and submit every run.
    Launch(LaunchArgs),
    /// Write the launch manifest without submitting anything.
    Plan(PlanArgs),
    /// Print the artifact registry and optionally check artifact paths.
    Artifacts(ArtifactsArgs),
    /// Query previously submitted runs.
    Ledger(LedgerArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Launch(args) => launch::run(&args),
        Command::Plan(args) => plan::run(&args),
        Command::Artifacts(args) => artifacts::run(&args),
        Command::Ledger(args) => ledger::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
