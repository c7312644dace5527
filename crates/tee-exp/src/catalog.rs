//! Artifact catalogs: the built-in Keystone provenance chain and YAML catalogs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactSpec};
use crate::registry::ArtifactRegistry;
use crate::serde::read_yaml_file;

const KEYSTONE_COMMIT: &str = "a1842a1ec959c4e40ffd55091795bb577894c545";

/// Handles to the records the default experiment references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystoneArtifacts {
    pub experiments_repo: ArtifactId,
    pub gem5_repo: ArtifactId,
    pub gem5_binary: ArtifactId,
    pub m5_binary: ArtifactId,
    pub keystone_repo: ArtifactId,
    pub eyrie_runtime: ArtifactId,
    pub keystone_driver: ArtifactId,
    pub test_runner: ArtifactId,
    pub musl_toolchain: ArtifactId,
    pub rv8_bench: ArtifactId,
    pub disk_image: ArtifactId,
    pub linux_repo: ArtifactId,
    pub linux_binary: ArtifactId,
    pub firmware: ArtifactId,
}

fn keystone_build(extra: &str) -> String {
    let mut command = format!(
        "cd keystone;\ngit checkout {KEYSTONE_COMMIT};\n./fast-setup.sh;\nsource source.sh;\nmkdir build;\ncd build;\ncmake ..;\nmake -j64;\n"
    );
    command.push_str(extra);
    command
}

/// Declares the Keystone-on-gem5 provenance chain in dependency order.
pub fn keystone_catalog() -> Result<(ArtifactRegistry, KeystoneArtifacts), TeeError> {
    let mut registry = ArtifactRegistry::new();

    let experiments_repo = registry.register(
        ArtifactSpec::new(
            "Keystone-experiments",
            ArtifactKind::GitRepo,
            "https://github.com/darchr/Keystone-experiments.git",
            "./",
        )
        .cwd("../")
        .documentation("main experiments repo to run keystone experiments on gem5"),
    )?;

    let gem5_repo = registry.register(
        ArtifactSpec::new(
            "gem5",
            ArtifactKind::GitRepo,
            "git clone https://gem5.googlesource.com/public/gem5",
            "gem5/",
        )
        .documentation(
            "cloned gem5 from googlesource and checked out develop version (as around June 1)",
        ),
    )?;

    let gem5_binary = registry.register(
        ArtifactSpec::new(
            "gem5.opt",
            ArtifactKind::SimulatorBinary,
            "cd gem5;\n\
             git checkout 62610709df76f4b544769cbbb;\n\
             git apply ../0001-arch-riscv-add-pma-pmp-checks-during-page-table-walk.patch;\n\
             git apply ../0002-arch-riscv-Update-the-way-a-valid-virtual-address-is.patch;\n\
             scons build/RISCV/gem5.opt -j8\n",
            "gem5/build/RISCV/gem5.opt",
        )
        .cwd("gem5/")
        .inputs([gem5_repo, experiments_repo])
        .documentation(
            "gem5 binary based on develop version (as around June 1) with the PMA/PMP page table walk patches applied",
        ),
    )?;

    let m5_binary = registry.register(
        ArtifactSpec::new(
            "m5",
            ArtifactKind::Binary,
            "scons -C util/m5 build/riscv/out/m5",
            "gem5/util/m5/build/riscv/out/m5",
        )
        .cwd("gem5/util/m5")
        .inputs([gem5_repo])
        .documentation("m5 utility"),
    )?;

    let keystone_repo = registry.register(
        ArtifactSpec::new(
            "keystone",
            ArtifactKind::GitRepo,
            "git clone https://github.com/keystone-enclave/keystone.git",
            "keystone/",
        )
        .documentation("Keystone enclave github repo"),
    )?;

    let eyrie_runtime = registry.register(
        ArtifactSpec::new(
            "eyrie runtime",
            ArtifactKind::Binary,
            keystone_build(
                "cd keystone/build/examples/tests/runtime/src/eyrie-test-eyrie;\n./build.sh paging;\n",
            ),
            "keystone/build/examples/tests/runtime/src/eyrie-test-eyrie/eyrie-rt",
        )
        .inputs([keystone_repo])
        .documentation("Eyrie runtime with paging enabled to run rv8 benchmarks"),
    )?;

    let keystone_driver = registry.register(
        ArtifactSpec::new(
            "keystone driver",
            ArtifactKind::Binary,
            keystone_build(""),
            "keystone/build/linux-keystone-driver.build/keystone-driver.ko",
        )
        .inputs([keystone_repo])
        .documentation("Keystone linux driver"),
    )?;

    let test_runner = registry.register(
        ArtifactSpec::new(
            "test runner",
            ArtifactKind::Binary,
            keystone_build(""),
            "keystone/build/examples/tests/test-runner",
        )
        .inputs([keystone_repo])
        .documentation("Test (untrusted) runner application"),
    )?;

    let musl_toolchain = registry.register(
        ArtifactSpec::new(
            "musl-riscv-toolchain",
            ArtifactKind::GitRepo,
            "git clone https://github.com/rv8-io/musl-riscv-toolchain.git;\n\
             cd musl-riscv-toolchain;\n\
             cp ../bootstrap_musl_riscv.sh bootstrap.sh;\n\
             sh bootstrap.sh riscv64;\n",
            "musl-riscv-toolchain/",
        )
        .inputs([experiments_repo])
        .documentation("musl riscv toolchain to compile rv8 benchmarks"),
    )?;

    let rv8_bench = registry.register(
        ArtifactSpec::new(
            "rv8 source",
            ArtifactKind::GitRepo,
            "git clone https://github.com/keystone-enclave/rv8-bench.git;\n\
             cd rv8-bench;\n\
             git checkout keystone;\n\
             export PATH=$PATH:/opt/riscv/musl-riscv-toolchain-8.2.0-1/bin/;\n\
             make\n",
            "rv8-bench/",
        )
        .inputs([experiments_repo, musl_toolchain])
        .documentation("rv8 benchmarks"),
    )?;

    let disk_image = registry.register(
        ArtifactSpec::new(
            "keystone-disk",
            ArtifactKind::DiskImage,
            keystone_build(
                "cd buildroot.build/images/;\n\
                 mkdir mnt;\n\
                 mount -o loop rootfs.ext2 mnt/;\n\
                 cd mnt/root/;\n\
                 cp ../../../../examples/tests/runtime/src/eyrie-test-eyrie/eyrie-rt . ;\n\
                 cp -r ../../../../../../keystone-bench/rv8-bench/bin/riscv64/ . ;\n\
                 cp ../../../../../../runscript.sh . ;\n\
                 cp ../../../../examples/tests/test-runner . ;\n\
                 cp ../../../../../../inittab ../etc/inittab ;\n\
                 rm ../etc/init.d/S40network ;\n\
                 cp ../../../../../../gem5/util/m5/build/riscv/out/m5 /sbin/m5;\n\
                 cd ../../ ;\n\
                 umount mnt/;\n",
            ),
            "keystone/build/buildroot.build/images/rootfs.ext2",
        )
        .inputs([
            experiments_repo,
            keystone_repo,
            m5_binary,
            eyrie_runtime,
            rv8_bench,
        ])
        .documentation(
            "Keystone disk image with RV8 benchmarks in addition to other needed components/changes to run the experiments",
        ),
    )?;

    let linux_repo = registry.register(
        ArtifactSpec::new(
            "linux source",
            ArtifactKind::GitRepo,
            format!("cd keystone;\ngit checkout {KEYSTONE_COMMIT};\n./fast-setup.sh;\n"),
            "keystone/linux",
        )
        .inputs([keystone_repo])
        .documentation("Linux kernel source (v5.7)"),
    )?;

    let linux_binary = registry.register(
        ArtifactSpec::new(
            "vmlinux",
            ArtifactKind::Binary,
            keystone_build(""),
            "keystone/build/linux.build/vmlinux",
        )
        .inputs([keystone_repo, linux_repo])
        .documentation("linux kernel binary which will be embedded into opensbi"),
    )?;

    let firmware = registry.register(
        ArtifactSpec::new(
            "firmware",
            ArtifactKind::Binary,
            keystone_build(""),
            "keystone/build/sm.build/platform/generic/firmware/fw_payload.elf",
        )
        .inputs([linux_binary, keystone_repo])
        .documentation("opensbi with keystone security monitor + linux kernel"),
    )?;

    Ok((
        registry,
        KeystoneArtifacts {
            experiments_repo,
            gem5_repo,
            gem5_binary,
            m5_binary,
            keystone_repo,
            eyrie_runtime,
            keystone_driver,
            test_runner,
            musl_toolchain,
            rv8_bench,
            disk_image,
            linux_repo,
            linux_binary,
            firmware,
        },
    ))
}

/// One artifact declaration in a YAML catalog; inputs are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub command: String,
    pub path: String,
    #[serde(default = "CatalogEntry::default_cwd")]
    pub cwd: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub documentation: String,
}

impl CatalogEntry {
    fn default_cwd() -> String {
        "./".to_string()
    }
}

/// YAML catalog file listing artifacts in dependency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArtifactCatalog {
    #[serde(default)]
    pub artifacts: Vec<CatalogEntry>,
}

impl ArtifactCatalog {
    /// Resolves input names into handles and registers every entry in order.
    pub fn into_registry(self) -> Result<ArtifactRegistry, TeeError> {
        let mut registry = ArtifactRegistry::new();
        for entry in self.artifacts {
            let mut inputs = Vec::with_capacity(entry.inputs.len());
            for input in &entry.inputs {
                let record = registry.find(input).ok_or_else(|| {
                    TeeError::Artifact(
                        ErrorInfo::new(
                            "catalog-unknown-input",
                            "catalog input must name an earlier artifact",
                        )
                        .with_context("name", entry.name.clone())
                        .with_context("input", input.clone()),
                    )
                })?;
                inputs.push(record.id);
            }
            registry.register(
                ArtifactSpec::new(entry.name, entry.kind, entry.command, entry.path)
                    .cwd(entry.cwd)
                    .inputs(inputs)
                    .documentation(entry.documentation),
            )?;
        }
        Ok(registry)
    }
}

/// Loads a YAML catalog from disk and builds its registry.
pub fn load_catalog(path: &Path) -> Result<ArtifactRegistry, TeeError> {
    let catalog: ArtifactCatalog = read_yaml_file(path, "catalog-read")?;
    catalog.into_registry()
}
