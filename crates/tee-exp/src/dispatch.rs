use tee_core::errors::TeeError;

use crate::hash::short_hash;
use crate::run::RunRequest;

/// Executes a batch of run requests with its own concurrency and failure policy.
///
/// The launcher calls [`Dispatcher::dispatch`] exactly once per launch with
/// the complete batch. Job outcomes are never reported back; an `Err` means
/// the dispatcher could not accept the batch at all.
pub trait Dispatcher {
    fn dispatch(&self, runs: Vec<RunRequest>) -> Result<(), TeeError>;
}

/// Logs the command line of every run without executing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl Dispatcher for DryRun {
    fn dispatch(&self, runs: Vec<RunRequest>) -> Result<(), TeeError> {
        log::info!("dry run: {} job(s) would be submitted", runs.len());
        for run in &runs {
            log::info!("[{}] {}", short_hash(&run.run_hash), run.command().join(" "));
        }
        Ok(())
    }
}
