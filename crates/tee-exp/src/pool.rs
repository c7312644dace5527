//! Local parallel job pool for simulator runs.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

use crate::dispatch::Dispatcher;
use crate::run::RunRequest;
use crate::serde::{from_json_slice, to_canonical_json_bytes};

fn io_error(code: &str, path: &Path, err: impl ToString) -> TeeError {
    TeeError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Lifecycle of a single run as recorded in its `status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Created,
    Running,
    Finished,
    Failed,
    TimedOut,
}

/// Contents of `<outdir>/status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_hash: String,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub elapsed_secs: f64,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one run inside a pool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_hash: String,
    pub outdir: String,
    pub state: RunState,
    /// True when the run was already finished and `resume` skipped it.
    pub skipped: bool,
}

/// Outcomes in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PoolReport {
    pub outcomes: Vec<RunOutcome>,
}

impl PoolReport {
    pub fn count(&self, state: RunState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Options governing pool execution.
#[derive(Debug, Clone)]
pub struct PoolOpts {
    /// Number of simulator processes allowed to run at once.
    pub parallelism: usize,
    /// Skip runs whose outdir already records a finished run with the same hash.
    pub resume: bool,
    /// Interval between liveness checks of a running simulator.
    pub poll_interval: Duration,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            parallelism: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            resume: false,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Runs simulator processes from a working directory, enforcing per-run timeouts.
#[derive(Debug, Clone)]
pub struct JobPool {
    workdir: PathBuf,
    opts: PoolOpts,
}

impl JobPool {
    pub fn new(workdir: impl Into<PathBuf>, opts: PoolOpts) -> Self {
        Self {
            workdir: workdir.into(),
            opts,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Executes every run and reports the outcomes in submission order.
    pub fn run_all(&self, runs: &[RunRequest]) -> Result<PoolReport, TeeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.parallelism.max(1))
            .thread_name(|idx| format!("tee-job-{idx}"))
            .build()
            .map_err(|err| TeeError::Dispatch(ErrorInfo::new("pool-build", err.to_string())))?;
        let outcomes: Vec<RunOutcome> =
            pool.install(|| runs.par_iter().map(|run| self.run_one(run)).collect());
        Ok(PoolReport { outcomes })
    }

    fn run_one(&self, run: &RunRequest) -> RunOutcome {
        let outdir = self.workdir.join(&run.outdir);
        if self.opts.resume && already_finished(&outdir, &run.run_hash) {
            log::info!("skipping finished run {}", run.outdir);
            return RunOutcome {
                run_hash: run.run_hash.clone(),
                outdir: run.outdir.clone(),
                state: RunState::Finished,
                skipped: true,
            };
        }
        let status = match self.execute(run, &outdir) {
            Ok(status) => status,
            Err(err) => {
                log::error!("run {} could not be executed: {}", run.outdir, err);
                let status = RunStatus {
                    run_hash: run.run_hash.clone(),
                    state: RunState::Failed,
                    exit_code: None,
                    elapsed_secs: 0.0,
                    started_at: Utc::now().to_rfc3339(),
                    finished_at: Some(Utc::now().to_rfc3339()),
                    error: Some(err.to_string()),
                };
                if let Err(err) = write_status(&outdir, &status) {
                    log::warn!("failed to record status for {}: {}", run.outdir, err);
                }
                status
            }
        };
        RunOutcome {
            run_hash: run.run_hash.clone(),
            outdir: run.outdir.clone(),
            state: status.state,
            skipped: false,
        }
    }

    fn execute(&self, run: &RunRequest, outdir: &Path) -> Result<RunStatus, TeeError> {
        fs::create_dir_all(outdir).map_err(|err| io_error("run-outdir", outdir, err))?;
        let info_path = outdir.join("info.json");
        fs::write(&info_path, to_canonical_json_bytes(run)?)
            .map_err(|err| io_error("run-info-write", &info_path, err))?;

        let started_at = Utc::now().to_rfc3339();
        let mut status = RunStatus {
            run_hash: run.run_hash.clone(),
            state: RunState::Created,
            exit_code: None,
            elapsed_secs: 0.0,
            started_at,
            finished_at: None,
            error: None,
        };
        write_status(outdir, &status)?;

        let command = run.command();
        let log_path = outdir.join("launcher.log");
        let log_file =
            File::create(&log_path).map_err(|err| io_error("run-log", &log_path, err))?;
        let err_file = log_file
            .try_clone()
            .map_err(|err| io_error("run-log", &log_path, err))?;
        let start = Instant::now();
        let mut child = Command::new(self.resolve_program(&command[0]))
            .args(&command[1..])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(err_file))
            .spawn()
            .map_err(|err| {
                TeeError::Dispatch(
                    ErrorInfo::new("run-spawn", err.to_string())
                        .with_context("program", command[0].clone()),
                )
            })?;
        log::debug!("started {} as pid {}", run.outdir, child.id());
        status.state = RunState::Running;
        if let Err(err) = write_status(outdir, &status) {
            log::warn!("failed to record running state for {}: {}", run.outdir, err);
        }

        let timeout = run.timeout();
        loop {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    status.exit_code = exit.code();
                    status.state = if exit.success() {
                        RunState::Finished
                    } else {
                        RunState::Failed
                    };
                    break;
                }
                Ok(None) if start.elapsed() >= timeout => {
                    log::warn!("run {} exceeded {}s, killing", run.outdir, run.timeout_secs);
                    stop(&mut child, &run.outdir);
                    status.state = RunState::TimedOut;
                    break;
                }
                Ok(None) => thread::sleep(self.opts.poll_interval),
                Err(err) => {
                    log::error!("lost track of {}: {}, killing", run.outdir, err);
                    stop(&mut child, &run.outdir);
                    status.state = RunState::Failed;
                    status.error = Some(err.to_string());
                    break;
                }
            }
        }
        status.elapsed_secs = start.elapsed().as_secs_f64();
        status.finished_at = Some(Utc::now().to_rfc3339());
        write_status(outdir, &status)?;
        match status.state {
            RunState::Finished => log::info!("run {} finished", run.outdir),
            state => log::error!("run {} ended as {:?}", run.outdir, state),
        }
        Ok(status)
    }

    fn resolve_program(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            self.workdir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Dispatcher for JobPool {
    fn dispatch(&self, runs: Vec<RunRequest>) -> Result<(), TeeError> {
        let report = self.run_all(&runs)?;
        log::info!(
            "job pool done: {} finished, {} failed, {} timed out",
            report.count(RunState::Finished),
            report.count(RunState::Failed),
            report.count(RunState::TimedOut)
        );
        Ok(())
    }
}

fn stop(child: &mut Child, outdir: &str) {
    if let Err(err) = child.kill() {
        log::warn!("kill failed for {}: {}", outdir, err);
    }
    if let Err(err) = child.wait() {
        log::warn!("reaping {} failed: {}", outdir, err);
    }
}

/// Reads `<outdir>/status.json` if present.
pub fn read_status(outdir: &Path) -> Result<Option<RunStatus>, TeeError> {
    let path = outdir.join("status.json");
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|err| io_error("status-read", &path, err))?;
    from_json_slice(&bytes).map(Some)
}

fn write_status(outdir: &Path, status: &RunStatus) -> Result<(), TeeError> {
    fs::create_dir_all(outdir).map_err(|err| io_error("run-outdir", outdir, err))?;
    let path = outdir.join("status.json");
    fs::write(&path, to_canonical_json_bytes(status)?)
        .map_err(|err| io_error("status-write", &path, err))
}

fn already_finished(outdir: &Path, run_hash: &str) -> bool {
    match read_status(outdir) {
        Ok(Some(status)) => status.state == RunState::Finished && status.run_hash == run_hash,
        Ok(None) => false,
        Err(err) => {
            log::warn!("ignoring unreadable status in {}: {}", outdir.display(), err);
            false
        }
    }
}
