use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use weave_classfile::opcodes::RETURN;
use weave_classfile::{AccessFlags, ClassBuilder, ClassHeader, MethodBody};

const PKG: &str = "top/clarkding/router";

fn stage() -> Command {
    let mut cmd = Command::cargo_bin("weave-stage").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_class(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(format!("{name}.class"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

/// A directory container with one adapter and, optionally, the registry.
fn project(root: &Path, with_registry: bool) -> std::path::PathBuf {
    let classes = root.join("classes");
    let adapter = ClassBuilder::new(&format!("{PKG}/Main"))
        .interface(&format!("{PKG}/IRouterAct"))
        .build()
        .unwrap();
    write_class(&classes, &format!("{PKG}/Main"), &adapter);

    if with_registry {
        let registry = ClassBuilder::new(&format!("{PKG}/ARouter"))
            .field(AccessFlags::PRIVATE, "mActRouters", "Ljava/util/Map;")
            .method(AccessFlags::PUBLIC, "init", "()V", |_| Ok(MethodBody::new(0, 1, [RETURN])))
            .build()
            .unwrap();
        write_class(&classes, &format!("{PKG}/ARouter"), &registry);
    }

    let manifest = root.join("invocation.json");
    let invocation = serde_json::json!({
        "target": "application",
        "output_root": root.join("out"),
        "inputs": [{ "name": "app", "path": classes, "kind": "directory", "scopes": ["project"] }],
    });
    fs::write(&manifest, invocation.to_string()).unwrap();
    manifest
}

#[test]
fn invocation_is_required() {
    stage().assert().failure().stderr(predicate::str::contains("--invocation"));
}

#[test]
fn patches_the_registry_and_prints_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = project(dir.path(), true);

    let output = stage().arg("--invocation").arg(&manifest).assert().success().get_output().stdout.clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(report["discovered"], serde_json::json!([format!("{PKG}/Main")]));
    assert_eq!(report["registry"]["patched"], true);
    assert_eq!(report["registry"]["sites"], 1);

    let patched = fs::read(dir.path().join(format!("out/directories/0-app/{PKG}/ARouter.class"))).unwrap();
    assert_eq!(ClassHeader::parse(&patched).unwrap().name, format!("{PKG}/ARouter"));
}

#[test]
fn report_can_go_to_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = project(dir.path(), true);
    let report = dir.path().join("report.json");

    stage()
        .arg("--invocation")
        .arg(&manifest)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(report["containers"], 1);
}

#[test]
fn missing_registry_is_fatal_when_required() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = project(dir.path(), false);

    stage().arg("--invocation").arg(&manifest).assert().success();
    stage()
        .env("WEAVE__REQUIRE_REGISTRY", "true")
        .arg("--invocation")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Registry class not found"));
}

#[test]
fn unreadable_manifest_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("invocation.json");
    fs::write(&manifest, "{ not json").unwrap();

    stage()
        .arg("--invocation")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid invocation"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = project(dir.path(), true);

    stage()
        .env("WEAVE__WORKERS", "0")
        .arg("--invocation")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration is malformed"));
}

#[test]
fn log_files_are_written_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = project(dir.path(), true);
    let logs = dir.path().join("logs");

    stage()
        .arg("--invocation")
        .arg(&manifest)
        .arg("--log-dir")
        .arg(&logs)
        .arg("--json-logs")
        .assert()
        .success();

    assert!(fs::read_dir(&logs).unwrap().next().is_some());
}
