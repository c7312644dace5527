use std::error::Error;
use std::process::Command;

use clap::Args;
use serde::Serialize;
use tee_core::SchemaVersion;

use super::print_json;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Emit extended metadata including git and simulator information.
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: String,
    manifest_schema: SchemaVersion,
    git_commit: String,
    rustc: String,
}

pub fn run(args: &VersionArgs) -> Result<(), Box<dyn Error>> {
    if !args.long {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    print_json(&VersionInfo {
        version: env!("CARGO_PKG_VERSION").into(),
        manifest_schema: SchemaVersion::default(),
        git_commit: command_output("git", &["rev-parse", "HEAD"])
            .unwrap_or_else(|| "unknown".into()),
        rustc: command_output("rustc", &["--version"])
            .unwrap_or_else(|| "rustc unavailable".into()),
    })
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    if out.status.success() {
        Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        None
    }
}
