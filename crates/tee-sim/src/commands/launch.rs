use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use tee_core::TeeError;
use tee_exp::{
    launch_with, ledger_append, write_manifest, Dispatcher, DryRun, JobPool, LaunchManifest, Ledger,
    PoolOpts,
};

use super::{resolve_plan, resolve_registry};

#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// Experiment plan YAML; the built-in Keystone plan is used when absent.
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// Artifact catalog YAML; the built-in Keystone catalog is used when absent.
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Directory the simulator is started from.
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,
    /// Maximum number of concurrent simulator processes.
    #[arg(long)]
    pub parallelism: Option<usize>,
    /// Skip runs that already finished with the same run hash.
    #[arg(long)]
    pub resume: bool,
    /// Log the command lines instead of running them.
    #[arg(long)]
    pub dry_run: bool,
    /// Where to write the launch manifest.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    /// Optional ledger path (`.csv`, `.sqlite` or `.db`) to append submitted runs.
    /// Ignored with `--dry-run`.
    #[arg(long)]
    pub ledger: Option<PathBuf>,
}

pub fn run(args: &LaunchArgs) -> Result<(), Box<dyn Error>> {
    let registry = resolve_registry(args.catalog.as_deref())?;
    let plan = resolve_plan(args.plan.as_deref())?;

    let dispatcher: Box<dyn Dispatcher> = if args.dry_run {
        Box::new(DryRun)
    } else {
        let mut opts = PoolOpts {
            resume: args.resume,
            ..PoolOpts::default()
        };
        if let Some(parallelism) = args.parallelism {
            opts.parallelism = parallelism;
        }
        Box::new(JobPool::new(args.workdir.clone(), opts))
    };
    let manifest_path = args
        .manifest
        .clone()
        .unwrap_or_else(|| args.workdir.join(&plan.results_root).join("launch_manifest.json"));
    // Provenance is on disk before the first simulator starts.
    let persist = |manifest: &LaunchManifest| -> Result<(), TeeError> {
        if !args.dry_run || args.manifest.is_some() {
            write_manifest(&manifest_path, manifest)?;
        }
        match &args.ledger {
            Some(path) if !args.dry_run => ledger_append(&Ledger::from_path(path), manifest),
            Some(_) => {
                log::info!("dry run: ledger left untouched");
                Ok(())
            }
            None => Ok(()),
        }
    };
    launch_with(&registry, &plan, dispatcher.as_ref(), persist).map_err(|err| {
        if err.is_construction() {
            log::error!("nothing was submitted: {err}");
        }
        err
    })?;
    Ok(())
}
