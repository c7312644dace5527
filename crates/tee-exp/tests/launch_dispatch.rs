use std::sync::Mutex;

use tee_core::errors::TeeError;
use tee_exp::{
    from_json_slice, keystone_catalog, launch, launch_with, write_manifest, Dispatcher, DryRun,
    ExperimentPlan, LaunchManifest, RunRequest,
};

#[derive(Default)]
struct RecordingDispatcher {
    batches: Mutex<Vec<Vec<RunRequest>>>,
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, runs: Vec<RunRequest>) -> Result<(), TeeError> {
        self.batches.lock().unwrap().push(runs);
        Ok(())
    }
}

#[test]
fn launch_hands_the_whole_batch_over_once() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let dispatcher = RecordingDispatcher::default();
    let manifest = launch(&registry, &ExperimentPlan::default(), &dispatcher).expect("launch");

    let batches = dispatcher.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 32);
    assert_eq!(batches[0], manifest.runs);
    assert_eq!(manifest.provenance.catalog_hash, registry.catalog_hash().unwrap());
}

#[test]
fn empty_axis_still_dispatches_an_empty_batch() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let mut plan = ExperimentPlan::default();
    plan.axes.benchmarks.clear();
    let dispatcher = RecordingDispatcher::default();
    let manifest = launch(&registry, &plan, &dispatcher).expect("launch");
    assert!(manifest.runs.is_empty());
    let batches = dispatcher.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_empty());
}

#[test]
fn invalid_plan_never_reaches_the_dispatcher() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let mut plan = ExperimentPlan::default();
    plan.axes.cores.push(0);
    let dispatcher = RecordingDispatcher::default();
    let err = launch(&registry, &plan, &dispatcher).expect_err("zero cores");
    assert_eq!(err.code(), "matrix-zero-cores");
    assert!(dispatcher.batches.lock().unwrap().is_empty());
}

#[test]
fn unbound_artifact_is_a_plan_error() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let mut plan = ExperimentPlan::default();
    plan.artifacts.disk_image = "ubuntu-disk".to_string();
    let err = launch(&registry, &plan, &DryRun).expect_err("missing binding");
    assert!(matches!(err, TeeError::Plan(_)));
    assert_eq!(err.code(), "plan-unbound-artifact");
}

#[test]
fn dry_run_accepts_any_batch() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let manifest = launch(&registry, &ExperimentPlan::default(), &DryRun).expect("dry run");
    assert_eq!(manifest.runs.len(), 32);
}

struct ManifestCheckingDispatcher {
    manifest: std::path::PathBuf,
    saw_manifest: Mutex<Option<bool>>,
}

impl Dispatcher for ManifestCheckingDispatcher {
    fn dispatch(&self, _runs: Vec<RunRequest>) -> Result<(), TeeError> {
        *self.saw_manifest.lock().unwrap() = Some(self.manifest.exists());
        Ok(())
    }
}

#[test]
fn manifest_is_persisted_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("launch_manifest.json");
    let (registry, _) = keystone_catalog().expect("catalog");
    let dispatcher = ManifestCheckingDispatcher {
        manifest: path.clone(),
        saw_manifest: Mutex::new(None),
    };
    let manifest = launch_with(&registry, &ExperimentPlan::default(), &dispatcher, |m| {
        write_manifest(&path, m)
    })
    .expect("launch");

    assert_eq!(*dispatcher.saw_manifest.lock().unwrap(), Some(true));
    let on_disk: LaunchManifest = from_json_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, manifest);
}

#[test]
fn failed_persist_submits_nothing() {
    let (registry, _) = keystone_catalog().expect("catalog");
    let dispatcher = RecordingDispatcher::default();
    let err = launch_with(&registry, &ExperimentPlan::default(), &dispatcher, |_| {
        Err(TeeError::Ledger(tee_core::ErrorInfo::new("ledger-open", "denied")))
    })
    .expect_err("persist failure");
    assert_eq!(err.code(), "ledger-open");
    assert!(dispatcher.batches.lock().unwrap().is_empty());
}
