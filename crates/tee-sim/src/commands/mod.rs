use std::error::Error;
use std::path::Path;

use serde::Serialize;
use tee_exp::{keystone_catalog, load_catalog, load_plan, ArtifactRegistry, ExperimentPlan};

pub mod artifacts;
pub mod launch;
pub mod ledger;
pub mod plan;
pub mod version;

/// Built-in Keystone catalog unless a YAML catalog is given.
pub(crate) fn resolve_registry(catalog: Option<&Path>) -> Result<ArtifactRegistry, Box<dyn Error>> {
    let registry = match catalog {
        Some(path) => load_catalog(path)?,
        None => keystone_catalog()?.0,
    };
    Ok(registry)
}

/// Built-in experiment plan unless a YAML plan is given.
pub(crate) fn resolve_plan(plan: Option<&Path>) -> Result<ExperimentPlan, Box<dyn Error>> {
    match plan {
        Some(path) => Ok(load_plan(path)?),
        None => Ok(ExperimentPlan::default()),
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let bytes = tee_exp::to_canonical_json_bytes(value)?;
    println!("{}", String::from_utf8(bytes)?);
    Ok(())
}
