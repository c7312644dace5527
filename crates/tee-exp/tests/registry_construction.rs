use tee_exp::{keystone_catalog, ArtifactKind, ArtifactRegistry, ArtifactSpec};

fn repo(name: &str) -> ArtifactSpec {
    ArtifactSpec::new(name, ArtifactKind::GitRepo, format!("git clone {name}"), format!("{name}/"))
}

#[test]
fn missing_required_fields_fail_construction() {
    let mut registry = ArtifactRegistry::new();
    for (spec, field) in [
        (ArtifactSpec::new("", ArtifactKind::Binary, "make", "out"), "name"),
        (ArtifactSpec::new("bin", ArtifactKind::Binary, "  ", "out"), "command"),
        (ArtifactSpec::new("bin", ArtifactKind::Binary, "make", ""), "path"),
    ] {
        let err = registry.register(spec).expect_err("construction should fail");
        assert_eq!(err.code(), "artifact-missing-field");
        assert_eq!(err.info().context.get("field").map(String::as_str), Some(field));
    }
    assert!(registry.is_empty());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut registry = ArtifactRegistry::new();
    registry.register(repo("gem5")).expect("first");
    let err = registry.register(repo("gem5")).expect_err("duplicate");
    assert_eq!(err.code(), "artifact-duplicate");
    assert_eq!(registry.len(), 1);
}

#[test]
fn handles_from_another_registry_are_rejected() {
    let mut other = ArtifactRegistry::new();
    other.register(repo("a")).expect("a");
    let foreign = other.register(repo("b")).expect("b");

    let mut registry = ArtifactRegistry::new();
    registry.register(repo("only")).expect("only");
    let err = registry
        .register(
            ArtifactSpec::new("bin", ArtifactKind::Binary, "make", "bin").inputs([foreign]),
        )
        .expect_err("foreign handle");
    assert_eq!(err.code(), "artifact-unknown-input");
}

#[test]
fn hashes_are_deterministic_and_follow_inputs() {
    let build = |repo_command: &str| {
        let mut registry = ArtifactRegistry::new();
        let src = registry
            .register(ArtifactSpec::new("src", ArtifactKind::GitRepo, repo_command, "src/"))
            .expect("src");
        let bin = registry
            .register(
                ArtifactSpec::new("bin", ArtifactKind::Binary, "make", "src/bin").inputs([src]),
            )
            .expect("bin");
        registry.get(bin).expect("record").hash.clone()
    };
    assert_eq!(build("git clone src"), build("git clone src"));
    assert_ne!(build("git clone src"), build("git clone src && git checkout v2"));
}

#[test]
fn keystone_catalog_declares_the_full_chain() {
    let (registry, handles) = keystone_catalog().expect("catalog");
    assert_eq!(registry.len(), 14);

    let gem5 = registry.get(handles.gem5_binary).expect("gem5 binary");
    assert_eq!(gem5.kind, ArtifactKind::SimulatorBinary);
    assert_eq!(gem5.path, "gem5/build/RISCV/gem5.opt");
    assert_eq!(gem5.inputs, vec![handles.gem5_repo, handles.experiments_repo]);

    let disk = registry.find("keystone-disk").expect("disk image");
    assert_eq!(disk.kind, ArtifactKind::DiskImage);
    assert!(disk.command.contains("mount -o loop rootfs.ext2 mnt/"));

    let firmware_deps = registry.dependencies(handles.firmware).expect("closure");
    assert_eq!(
        firmware_deps,
        vec![handles.keystone_repo, handles.linux_repo, handles.linux_binary]
    );

    // Registration order is topological.
    for record in registry.iter() {
        assert!(record.inputs.iter().all(|input| input.index() < record.id.index()));
    }
}
