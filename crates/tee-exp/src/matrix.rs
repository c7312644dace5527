use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

/// Independent experiment axes, declared in nesting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigMatrix {
    /// Security configurations (outermost axis).
    #[serde(default)]
    pub security: Vec<String>,
    /// Simulated CPU models.
    #[serde(default)]
    pub cpu: Vec<String>,
    /// Simulated core counts.
    #[serde(default)]
    pub cores: Vec<u32>,
    /// Benchmark binaries (innermost axis).
    #[serde(default)]
    pub benchmarks: Vec<String>,
}

/// One point of the configuration matrix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigTuple {
    pub security: String,
    pub cpu: String,
    pub cores: u32,
    pub benchmark: String,
}

impl ConfigTuple {
    /// Output directory for this tuple: `<root>/<security>/<benchmark>/<cpu>/<cores>`.
    ///
    /// Always `/`-joined so manifests are identical across hosts.
    pub fn outdir(&self, root: &str) -> String {
        let relative = format!(
            "{}/{}/{}/{}",
            self.security, self.benchmark, self.cpu, self.cores
        );
        if root.is_empty() {
            return relative;
        }
        format!("{}/{relative}", root.trim_end_matches('/'))
    }
}

impl ConfigMatrix {
    /// Number of tuples the matrix expands to, or `None` if it overflows `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.security
            .len()
            .checked_mul(self.cpu.len())?
            .checked_mul(self.cores.len())?
            .checked_mul(self.benchmarks.len())
    }

    /// Number of tuples the matrix expands to, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects axis values that would make two tuples share an output directory.
    ///
    /// Empty axes are valid and expand to nothing.
    pub fn validate(&self) -> Result<(), TeeError> {
        if self.checked_len().is_none() {
            return Err(TeeError::Matrix(
                ErrorInfo::new("matrix-too-large", "axis product overflows the run count")
                    .with_context("security", self.security.len().to_string())
                    .with_context("cpu", self.cpu.len().to_string())
                    .with_context("cores", self.cores.len().to_string())
                    .with_context("benchmarks", self.benchmarks.len().to_string()),
            ));
        }
        validate_labels("security", &self.security)?;
        validate_labels("cpu", &self.cpu)?;
        validate_labels("benchmarks", &self.benchmarks)?;
        let mut seen = BTreeSet::new();
        for cores in &self.cores {
            if *cores == 0 {
                return Err(TeeError::Matrix(
                    ErrorInfo::new("matrix-zero-cores", "core count must be positive")
                        .with_context("axis", "cores"),
                ));
            }
            if !seen.insert(*cores) {
                return Err(duplicate("cores", &cores.to_string()));
            }
        }
        Ok(())
    }

    /// Cartesian product in declaration order: security, cpu, cores, benchmark.
    pub fn tuples(&self) -> Vec<ConfigTuple> {
        let mut tuples = Vec::with_capacity(self.checked_len().unwrap_or(0));
        for security in &self.security {
            for cpu in &self.cpu {
                for cores in &self.cores {
                    for benchmark in &self.benchmarks {
                        tuples.push(ConfigTuple {
                            security: security.clone(),
                            cpu: cpu.clone(),
                            cores: *cores,
                            benchmark: benchmark.clone(),
                        });
                    }
                }
            }
        }
        tuples
    }
}

fn validate_labels(axis: &str, values: &[String]) -> Result<(), TeeError> {
    let mut seen = BTreeSet::new();
    for value in values {
        // Each label becomes exactly one path component.
        if value.is_empty()
            || value == "."
            || value == ".."
            || value.contains('/')
            || value.contains('\\')
        {
            return Err(TeeError::Matrix(
                ErrorInfo::new("matrix-bad-label", "axis value is not a single path component")
                    .with_context("axis", axis)
                    .with_context("value", value.clone()),
            ));
        }
        if !seen.insert(value.as_str()) {
            return Err(duplicate(axis, value));
        }
    }
    Ok(())
}

fn duplicate(axis: &str, value: &str) -> TeeError {
    TeeError::Matrix(
        ErrorInfo::new("matrix-duplicate", "axis value listed more than once")
            .with_context("axis", axis)
            .with_context("value", value),
    )
}
