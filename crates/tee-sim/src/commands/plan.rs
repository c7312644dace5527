use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use tee_exp::{plan_runs, write_manifest};

use super::{resolve_plan, resolve_registry};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Experiment plan YAML; the built-in Keystone plan is used when absent.
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// Artifact catalog YAML; the built-in Keystone catalog is used when absent.
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Output directory for the manifest and the resolved plan.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &PlanArgs) -> Result<(), Box<dyn Error>> {
    let registry = resolve_registry(args.catalog.as_deref())?;
    let plan = resolve_plan(args.plan.as_deref())?;
    let manifest = plan_runs(&registry, &plan)?;

    fs::create_dir_all(&args.out)?;
    write_manifest(&args.out.join("launch_manifest.json"), &manifest)?;
    fs::write(args.out.join("plan.yaml"), plan.to_yaml_string()?)?;
    println!(
        "{} run(s) planned, plan hash {}",
        manifest.runs.len(),
        manifest.provenance.plan_hash
    );
    Ok(())
}
