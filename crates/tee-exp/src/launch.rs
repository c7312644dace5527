use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};
use tee_core::provenance::{LaunchProvenance, SchemaVersion};

use crate::artifact::ArtifactRecord;
use crate::dispatch::Dispatcher;
use crate::hash::short_hash;
use crate::matrix::ConfigMatrix;
use crate::plan::ExperimentPlan;
use crate::registry::ArtifactRegistry;
use crate::run::{RunRequest, RunTemplate};
use crate::serde::to_canonical_json_bytes;

/// Expands the matrix into one run request per tuple, in axis nesting order.
///
/// An empty axis yields an empty batch.
pub fn enumerate_runs(
    template: &RunTemplate,
    matrix: &ConfigMatrix,
) -> Result<Vec<RunRequest>, TeeError> {
    template.validate()?;
    matrix.validate()?;
    matrix
        .tuples()
        .into_iter()
        .map(|tuple| template.build(tuple))
        .collect()
}

/// Reproducibility record of one launch: the plan, every artifact and every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchManifest {
    pub plan: ExperimentPlan,
    pub provenance: LaunchProvenance,
    pub artifacts: Vec<ArtifactRecord>,
    pub runs: Vec<RunRequest>,
}

/// Builds the full batch and its manifest without dispatching anything.
pub fn plan_runs(
    registry: &ArtifactRegistry,
    plan: &ExperimentPlan,
) -> Result<LaunchManifest, TeeError> {
    let template = plan.template(registry)?;
    let runs = enumerate_runs(&template, &plan.axes)?;
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert("tee-exp".to_string(), env!("CARGO_PKG_VERSION").to_string());
    Ok(LaunchManifest {
        plan: plan.clone(),
        provenance: LaunchProvenance {
            schema: SchemaVersion::default(),
            plan_hash: plan.plan_hash()?,
            catalog_hash: registry.catalog_hash()?,
            created_at: Utc::now().to_rfc3339(),
            tool_versions,
        },
        artifacts: registry.iter().cloned().collect(),
        runs,
    })
}

/// Plans every run and hands the whole batch to `dispatcher` in one call.
pub fn launch<D: Dispatcher + ?Sized>(
    registry: &ArtifactRegistry,
    plan: &ExperimentPlan,
    dispatcher: &D,
) -> Result<LaunchManifest, TeeError> {
    launch_with(registry, plan, dispatcher, |_| Ok(()))
}

/// Like [`launch`], but runs `persist` on the manifest before anything is dispatched.
///
/// An error from `persist` aborts the launch with nothing submitted.
pub fn launch_with<D, F>(
    registry: &ArtifactRegistry,
    plan: &ExperimentPlan,
    dispatcher: &D,
    persist: F,
) -> Result<LaunchManifest, TeeError>
where
    D: Dispatcher + ?Sized,
    F: FnOnce(&LaunchManifest) -> Result<(), TeeError>,
{
    let manifest = plan_runs(registry, plan)?;
    persist(&manifest)?;
    log::info!(
        "submitting {} run(s) for '{}' (plan {})",
        manifest.runs.len(),
        plan.label,
        short_hash(&manifest.provenance.plan_hash)
    );
    dispatcher.dispatch(manifest.runs.clone())?;
    Ok(manifest)
}

/// Writes the manifest as canonical JSON, creating parent directories.
pub fn write_manifest(path: &Path, manifest: &LaunchManifest) -> Result<(), TeeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| manifest_io_error("manifest-dir", parent, err))?;
    }
    fs::write(path, to_canonical_json_bytes(manifest)?)
        .map_err(|err| manifest_io_error("manifest-write", path, err))?;
    log::info!("wrote launch manifest to {}", path.display());
    Ok(())
}

fn manifest_io_error(code: &str, path: &Path, err: std::io::Error) -> TeeError {
    TeeError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}
