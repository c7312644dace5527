use std::fs;
use std::process::Command;

fn tee_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tee-sim"))
}

#[test]
fn plan_writes_manifest_for_builtin_experiment() {
    let out = tempfile::tempdir().expect("tempdir");
    let status = tee_sim()
        .args(["plan", "--out"])
        .arg(out.path())
        .status()
        .expect("run tee-sim plan");
    assert!(status.success(), "plan command failed");

    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(out.path().join("launch_manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["runs"].as_array().map(Vec::len), Some(32));
    assert!(out.path().join("plan.yaml").exists());
}

#[test]
fn dry_run_launch_submits_nothing() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let ledger = workdir.path().join("runs.csv");
    let status = tee_sim()
        .args(["launch", "--dry-run", "--workdir"])
        .arg(workdir.path())
        .arg("--ledger")
        .arg(&ledger)
        .status()
        .expect("run tee-sim launch");
    assert!(status.success(), "dry run failed");
    assert!(!workdir.path().join("results").exists());
    assert!(!ledger.exists(), "dry run must not record runs in the ledger");
}

#[test]
fn artifact_check_fails_on_empty_root() {
    let root = tempfile::tempdir().expect("tempdir");
    let output = tee_sim()
        .args(["artifacts", "--check", "--root"])
        .arg(root.path())
        .output()
        .expect("run tee-sim artifacts");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("needs-attention"));
}
