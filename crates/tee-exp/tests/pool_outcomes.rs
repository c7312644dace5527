#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use tee_exp::pool::read_status;
use tee_exp::{
    enumerate_runs, keystone_catalog, ConfigMatrix, ExperimentPlan, JobPool, PoolOpts, RunRequest,
    RunState,
};

fn script(dir: &Path, name: &str, body: &str) {
    let path = dir.join("bin").join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

fn run_for(simulator: &str, benchmark: &str) -> RunRequest {
    let (registry, _) = keystone_catalog().unwrap();
    let mut template = ExperimentPlan::default().template(&registry).unwrap();
    template.simulator = format!("bin/{simulator}");
    template.timeout_secs = 1;
    let matrix = ConfigMatrix {
        security: vec!["untrusted".to_string()],
        cpu: vec!["timing".to_string()],
        cores: vec![1],
        benchmarks: vec![benchmark.to_string()],
    };
    enumerate_runs(&template, &matrix).unwrap().remove(0)
}

#[test]
fn pool_records_each_outcome_and_resumes() {
    let workdir = tempfile::tempdir().unwrap();
    // Every script exists before the first spawn.
    script(workdir.path(), "ok.sh", "echo \"args: $*\"");
    script(workdir.path(), "fail.sh", "exit 3");
    script(workdir.path(), "hang.sh", "exec sleep 30");

    let runs = vec![
        run_for("ok.sh", "aes.O3"),
        run_for("fail.sh", "bigint.O3"),
        run_for("hang.sh", "dhrystone.O3"),
    ];
    let opts = PoolOpts {
        parallelism: 3,
        resume: true,
        poll_interval: Duration::from_millis(50),
    };
    let pool = JobPool::new(workdir.path(), opts);
    let report = pool.run_all(&runs).unwrap();

    let states: Vec<_> = report.outcomes.iter().map(|o| o.state).collect();
    assert_eq!(
        states,
        vec![RunState::Finished, RunState::Failed, RunState::TimedOut]
    );
    assert!(report.outcomes.iter().all(|o| !o.skipped));

    let ok_dir = workdir.path().join(&runs[0].outdir);
    assert!(ok_dir.join("info.json").exists());
    let log = fs::read_to_string(ok_dir.join("launcher.log")).unwrap();
    assert!(log.contains("-re --outdir=results/untrusted/aes.O3/timing/1"));
    let status = read_status(&ok_dir).unwrap().expect("status");
    assert_eq!(status.exit_code, Some(0));
    assert_eq!(status.run_hash, runs[0].run_hash);

    let failed = read_status(&workdir.path().join(&runs[1].outdir))
        .unwrap()
        .expect("status");
    assert_eq!(failed.exit_code, Some(3));

    let rerun = pool.run_all(&runs[..1]).unwrap();
    assert!(rerun.outcomes[0].skipped);
    assert_eq!(rerun.count(RunState::Finished), 1);
}

#[test]
fn missing_simulator_is_recorded_as_failed() {
    let workdir = tempfile::tempdir().unwrap();
    let run = run_for("absent.sh", "aes.O3");
    let pool = JobPool::new(workdir.path(), PoolOpts::default());
    let report = pool.run_all(std::slice::from_ref(&run)).unwrap();
    assert_eq!(report.outcomes[0].state, RunState::Failed);
    let status = read_status(&workdir.path().join(&run.outdir))
        .unwrap()
        .expect("status");
    assert!(status.error.is_some());
}

#[test]
fn unwritable_status_still_waits_for_the_simulator() {
    let workdir = tempfile::tempdir().unwrap();
    script(
        workdir.path(),
        "clobber.sh",
        "out=\"${2#--outdir=}\"\nrm -f \"$out/status.json\"\nmkdir \"$out/status.json\"\nsleep 1\ntouch \"$out/done\"",
    );
    let mut run = run_for("clobber.sh", "aes.O3");
    run.timeout_secs = 30;
    let opts = PoolOpts {
        parallelism: 1,
        resume: false,
        poll_interval: Duration::from_millis(50),
    };
    let report = JobPool::new(workdir.path(), opts)
        .run_all(std::slice::from_ref(&run))
        .unwrap();

    assert_eq!(report.outcomes[0].state, RunState::Failed);
    // The pool returns only after the simulator has exited.
    assert!(workdir.path().join(&run.outdir).join("done").exists());
}
