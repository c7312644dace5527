//! Artifact provenance and experiment orchestration for Keystone on gem5.

mod artifact;
pub mod catalog;
mod dispatch;
mod hash;
mod launch;
mod ledger;
mod matrix;
mod plan;
pub mod pool;
mod registry;
mod run;
pub mod serde;

pub use artifact::{ArtifactId, ArtifactKind, ArtifactRecord, ArtifactRef, ArtifactSpec};
pub use catalog::{keystone_catalog, load_catalog, ArtifactCatalog, CatalogEntry, KeystoneArtifacts};
pub use dispatch::{Dispatcher, DryRun};
pub use hash::stable_hash_string;
pub use launch::{enumerate_runs, launch, launch_with, plan_runs, write_manifest, LaunchManifest};
pub use ledger::{ledger_append, ledger_query, Ledger, Query, Table};
pub use matrix::{ConfigMatrix, ConfigTuple};
pub use plan::{load_plan, ArtifactBindings, ExperimentPlan};
pub use pool::{JobPool, PoolOpts, PoolReport, RunOutcome, RunState, RunStatus};
pub use registry::ArtifactRegistry;
pub use run::{RunParams, RunRequest, RunTemplate, CONFIG_TOKEN, DEFAULT_TIMEOUT_SECS};

pub use crate::serde::{from_json_slice, to_canonical_json_bytes};
