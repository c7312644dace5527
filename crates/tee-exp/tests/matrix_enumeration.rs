use std::collections::BTreeSet;

use proptest::prelude::*;
use tee_exp::{
    enumerate_runs, keystone_catalog, plan_runs, ConfigMatrix, ExperimentPlan, RunTemplate,
};

fn template() -> RunTemplate {
    let (registry, _) = keystone_catalog().expect("catalog");
    ExperimentPlan::default()
        .template(&registry)
        .expect("template")
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn four_run_scenario_matches_expected_layout() {
    let matrix = ConfigMatrix {
        security: labels(&["untrusted", "trusted"]),
        cpu: labels(&["timing", "minor"]),
        cores: vec![1],
        benchmarks: labels(&["aes.O3"]),
    };
    let runs = enumerate_runs(&template(), &matrix).expect("runs");
    let outdirs: Vec<&str> = runs.iter().map(|run| run.outdir.as_str()).collect();
    assert_eq!(
        outdirs,
        vec![
            "results/untrusted/aes.O3/timing/1",
            "results/untrusted/aes.O3/minor/1",
            "results/trusted/aes.O3/timing/1",
            "results/trusted/aes.O3/minor/1",
        ]
    );
    assert_eq!(runs[2].config_script, "configs-riscv-keystone/run_trusted.py");
    assert!(runs[0].config_script.ends_with("run_untrusted.py"));
}

#[test]
fn default_plan_expands_to_thirty_two_runs() {
    let (registry, handles) = keystone_catalog().expect("catalog");
    let manifest = plan_runs(&registry, &ExperimentPlan::default()).expect("plan");
    assert_eq!(manifest.runs.len(), 32);
    assert_eq!(manifest.artifacts.len(), registry.len());

    let first = &manifest.runs[0];
    assert_eq!(first.outdir, "results/untrusted/aes.O3/timing/1");
    assert_eq!(
        first.command(),
        vec![
            "gem5/build/RISCV/gem5.opt",
            "-re",
            "--outdir=results/untrusted/aes.O3/timing/1",
            "configs-riscv-keystone/run_untrusted.py",
            "keystone/build/sm.build/platform/generic/firmware/fw_payload.elf",
            "keystone/build/buildroot.build/images/rootfs.ext2",
            "timing",
            "1",
            "aes.O3",
        ]
    );
    let ids: Vec<_> = first.artifacts.iter().map(|a| a.id).collect();
    assert_eq!(
        ids,
        vec![
            handles.gem5_binary,
            handles.gem5_repo,
            handles.experiments_repo,
            handles.firmware,
            handles.disk_image,
        ]
    );
    for run in &manifest.runs {
        assert_eq!(run.timeout_secs, 72_000);
        assert_eq!(run.artifacts, first.artifacts);
    }
    let hashes: BTreeSet<_> = manifest.runs.iter().map(|r| r.run_hash.clone()).collect();
    assert_eq!(hashes.len(), 32);
}

#[test]
fn any_empty_axis_yields_no_runs() {
    let full = ExperimentPlan::default().axes;
    let mut cases = vec![full.clone(); 4];
    cases[0].security.clear();
    cases[1].cpu.clear();
    cases[2].cores.clear();
    cases[3].benchmarks.clear();
    let template = template();
    for matrix in cases {
        assert!(enumerate_runs(&template, &matrix).expect("runs").is_empty());
    }
}

#[test]
fn colliding_axis_values_are_rejected() {
    let template = template();
    let mut duplicate = ExperimentPlan::default().axes;
    duplicate.cpu.push("timing".to_string());
    let err = enumerate_runs(&template, &duplicate).expect_err("duplicate cpu");
    assert_eq!(err.code(), "matrix-duplicate");

    let mut nested = ExperimentPlan::default().axes;
    nested.benchmarks.push("rv8/aes.O3".to_string());
    let err = enumerate_runs(&template, &nested).expect_err("nested label");
    assert_eq!(err.code(), "matrix-bad-label");
}

#[test]
fn template_requires_a_single_security_token() {
    let mut broken = template();
    broken.config_template = "configs-riscv-keystone/run.py".to_string();
    let err = enumerate_runs(&broken, &ExperimentPlan::default().axes).expect_err("no token");
    assert_eq!(err.code(), "run-config-template");
}

fn axis(prefix: &'static str) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(0u8..16, 0..4)
        .prop_map(move |set| set.into_iter().map(|v| format!("{prefix}{v}")).collect())
}

proptest! {
    #[test]
    fn run_count_is_product_and_outdirs_are_unique(
        security in axis("sec"),
        cpu in axis("cpu"),
        cores in prop::collection::btree_set(1u32..64, 0..4),
        benchmarks in axis("bench"),
    ) {
        let matrix = ConfigMatrix {
            security,
            cpu,
            cores: cores.into_iter().collect(),
            benchmarks,
        };
        let expected = matrix.security.len()
            * matrix.cpu.len()
            * matrix.cores.len()
            * matrix.benchmarks.len();
        let runs = enumerate_runs(&template(), &matrix).unwrap();
        prop_assert_eq!(runs.len(), expected);
        let outdirs: BTreeSet<_> = runs.iter().map(|r| r.outdir.clone()).collect();
        prop_assert_eq!(outdirs.len(), runs.len());
        prop_assert!(runs.iter().all(|r| r.timeout_secs == 72_000));
    }
}

#[test]
fn overflowing_matrix_is_rejected_before_expansion() {
    let side = 1usize << (usize::BITS / 4);
    let many = |prefix: &str| (0..side).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>();
    let matrix = ConfigMatrix {
        security: many("sec"),
        cpu: many("cpu"),
        cores: (1..=side as u32).collect(),
        benchmarks: many("bench"),
    };
    assert_eq!(matrix.checked_len(), None);
    let err = enumerate_runs(&template(), &matrix).expect_err("overflow");
    assert_eq!(err.code(), "matrix-too-large");
}
