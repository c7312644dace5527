use std::time::Duration;

use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

use crate::artifact::ArtifactRef;
use crate::hash::stable_hash_string;
use crate::matrix::ConfigTuple;

/// Token replaced by the security configuration in the config script template.
pub const CONFIG_TOKEN: &str = "{}";

/// 20 hours.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20 * 60 * 60;

/// Per-run configuration parameters forwarded to the simulator config script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub security: String,
    pub cpu: String,
    pub cores: u32,
    pub benchmark: String,
}

impl From<ConfigTuple> for RunParams {
    fn from(tuple: ConfigTuple) -> Self {
        Self {
            security: tuple.security,
            cpu: tuple.cpu,
            cores: tuple.cores,
            benchmark: tuple.benchmark,
        }
    }
}

/// One fully specified full-system simulation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub label: String,
    /// Simulator binary, relative to the dispatcher's working directory.
    pub simulator: String,
    pub config_script: String,
    pub outdir: String,
    /// Simulator binary, simulator repo, experiments repo, firmware, disk image.
    pub artifacts: Vec<ArtifactRef>,
    pub params: RunParams,
    /// Firmware payload (OpenSBI + security monitor + kernel) booted by the simulator.
    pub kernel: String,
    pub disk_image: String,
    pub timeout_secs: u64,
    /// Fingerprint over every other field.
    pub run_hash: String,
}

impl RunRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Simulator invocation: binary, redirect flag, outdir, script, then script arguments.
    pub fn command(&self) -> Vec<String> {
        vec![
            self.simulator.clone(),
            "-re".to_string(),
            format!("--outdir={}", self.outdir),
            self.config_script.clone(),
            self.kernel.clone(),
            self.disk_image.clone(),
            self.params.cpu.clone(),
            self.params.cores.to_string(),
            self.params.benchmark.clone(),
        ]
    }
}

/// Fields shared by every run of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTemplate {
    pub label: String,
    pub simulator: String,
    pub config_template: String,
    pub results_root: String,
    pub kernel: String,
    pub disk_image: String,
    pub timeout_secs: u64,
    pub artifacts: Vec<ArtifactRef>,
}

#[derive(Serialize)]
struct RunFingerprint<'a> {
    label: &'a str,
    simulator: &'a str,
    config_script: &'a str,
    outdir: &'a str,
    artifacts: Vec<&'a str>,
    params: &'a RunParams,
    kernel: &'a str,
    disk_image: &'a str,
    timeout_secs: u64,
}

impl RunTemplate {
    /// Checks the fields every run depends on.
    pub fn validate(&self) -> Result<(), TeeError> {
        for (field, value) in [
            ("label", &self.label),
            ("simulator", &self.simulator),
            ("config_template", &self.config_template),
            ("kernel", &self.kernel),
            ("disk_image", &self.disk_image),
        ] {
            if value.trim().is_empty() {
                return Err(TeeError::Plan(
                    ErrorInfo::new("run-missing-field", "required run field is empty")
                        .with_context("field", field),
                ));
            }
        }
        let tokens = self.config_template.matches(CONFIG_TOKEN).count();
        if tokens != 1 {
            return Err(TeeError::Plan(
                ErrorInfo::new(
                    "run-config-template",
                    "config template must contain exactly one security token",
                )
                .with_context("template", self.config_template.clone())
                .with_context("tokens", tokens.to_string())
                .with_hint("use a template such as configs-riscv-keystone/run_{}.py"),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(TeeError::Plan(
                ErrorInfo::new("run-timeout", "timeout must be positive")
                    .with_context("timeout_secs", "0"),
            ));
        }
        Ok(())
    }

    /// Config script for a security configuration.
    pub fn config_script(&self, security: &str) -> String {
        self.config_template.replacen(CONFIG_TOKEN, security, 1)
    }

    /// Builds the run request for one matrix tuple.
    pub fn build(&self, tuple: ConfigTuple) -> Result<RunRequest, TeeError> {
        let config_script = self.config_script(&tuple.security);
        let outdir = tuple.outdir(&self.results_root);
        let params = RunParams::from(tuple);
        let run_hash = stable_hash_string(&RunFingerprint {
            label: &self.label,
            simulator: &self.simulator,
            config_script: &config_script,
            outdir: &outdir,
            artifacts: self.artifacts.iter().map(|a| a.hash.as_str()).collect(),
            params: &params,
            kernel: &self.kernel,
            disk_image: &self.disk_image,
            timeout_secs: self.timeout_secs,
        })?;
        Ok(RunRequest {
            label: self.label.clone(),
            simulator: self.simulator.clone(),
            config_script,
            outdir,
            artifacts: self.artifacts.clone(),
            params,
            kernel: self.kernel.clone(),
            disk_image: self.disk_image.clone(),
            timeout_secs: self.timeout_secs,
            run_hash,
        })
    }
}
