use std::path::Path;

use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

use crate::artifact::ArtifactRef;
use crate::hash::stable_hash_string;
use crate::matrix::ConfigMatrix;
use crate::registry::ArtifactRegistry;
use crate::run::{RunTemplate, DEFAULT_TIMEOUT_SECS};
use crate::serde::{read_yaml_file, to_yaml_string};

/// Names of the registry records every run references, in run order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBindings {
    pub simulator_binary: String,
    pub simulator_repo: String,
    pub experiments_repo: String,
    pub kernel: String,
    pub disk_image: String,
}

impl ArtifactBindings {
    fn ordered(&self) -> [(&'static str, &str); 5] {
        [
            ("simulator_binary", self.simulator_binary.as_str()),
            ("simulator_repo", self.simulator_repo.as_str()),
            ("experiments_repo", self.experiments_repo.as_str()),
            ("kernel", self.kernel.as_str()),
            ("disk_image", self.disk_image.as_str()),
        ]
    }
}

impl Default for ArtifactBindings {
    fn default() -> Self {
        Self {
            simulator_binary: "gem5.opt".to_string(),
            simulator_repo: "gem5".to_string(),
            experiments_repo: "Keystone-experiments".to_string(),
            kernel: "firmware".to_string(),
            disk_image: "keystone-disk".to_string(),
        }
    }
}

/// Experiment plan describing the shared run fields and the configuration matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    pub label: String,
    pub simulator: String,
    /// Config script path containing a single `{}` security token.
    pub config_template: String,
    #[serde(default = "ExperimentPlan::default_results_root")]
    pub results_root: String,
    pub kernel: String,
    pub disk_image: String,
    #[serde(default = "ExperimentPlan::default_timeout_secs")]
    pub timeout_secs: u64,
    pub axes: ConfigMatrix,
    #[serde(default)]
    pub artifacts: ArtifactBindings,
}

impl ExperimentPlan {
    fn default_results_root() -> String {
        "results".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    /// Returns the deterministic hash associated with the plan contents.
    pub fn plan_hash(&self) -> Result<String, TeeError> {
        stable_hash_string(self)
    }

    pub fn to_yaml_string(&self) -> Result<String, TeeError> {
        to_yaml_string(self)
    }

    /// Resolves the artifact bindings against `registry` into the shared run template.
    pub fn template(&self, registry: &ArtifactRegistry) -> Result<RunTemplate, TeeError> {
        let mut artifacts: Vec<ArtifactRef> = Vec::with_capacity(5);
        for (role, name) in self.artifacts.ordered() {
            let record = registry.find(name).ok_or_else(|| {
                TeeError::Plan(
                    ErrorInfo::new("plan-unbound-artifact", "plan references an unknown artifact")
                        .with_context("role", role)
                        .with_context("name", name),
                )
            })?;
            artifacts.push(ArtifactRef::from(record));
        }
        let template = RunTemplate {
            label: self.label.clone(),
            simulator: self.simulator.clone(),
            config_template: self.config_template.clone(),
            results_root: self.results_root.clone(),
            kernel: self.kernel.clone(),
            disk_image: self.disk_image.clone(),
            timeout_secs: self.timeout_secs,
            artifacts,
        };
        template.validate()?;
        Ok(template)
    }
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        Self {
            label: "keystone experiments with gem5 for carrv".to_string(),
            simulator: "gem5/build/RISCV/gem5.opt".to_string(),
            config_template: "configs-riscv-keystone/run_{}.py".to_string(),
            results_root: Self::default_results_root(),
            kernel: "keystone/build/sm.build/platform/generic/firmware/fw_payload.elf"
                .to_string(),
            disk_image: "keystone/build/buildroot.build/images/rootfs.ext2".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            axes: ConfigMatrix {
                security: vec!["untrusted".to_string(), "trusted".to_string()],
                cpu: vec!["timing".to_string(), "minor".to_string()],
                cores: vec![1],
                benchmarks: [
                    "aes.O3",
                    "bigint.O3",
                    "dhrystone.O3",
                    "miniz.O3",
                    "norx.O3",
                    "primes.O3",
                    "qsort.O3",
                    "sha512.O3",
                ]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            },
            artifacts: ArtifactBindings::default(),
        }
    }
}

/// Loads an experiment plan from a YAML file.
pub fn load_plan(path: &Path) -> Result<ExperimentPlan, TeeError> {
    read_yaml_file(path, "plan-read")
}
