use serde_json::json;
use std::path::PathBuf;
use weave_domain::invocation::{BuildInvocation, BuildTarget, ContainerKind};
use weave_domain::scope::Scope;

#[test]
fn manifest_deserializes() {
    let raw = json!({
        "target": "application",
        "output_root": "build/weave",
        "inputs": [
            { "name": "app", "path": "build/classes", "kind": "directory", "scopes": ["project"] },
            { "name": "feature", "path": "libs/feature.jar", "kind": "archive", "output": "out/feature.jar" }
        ]
    });

    let invocation: BuildInvocation = serde_json::from_value(raw).expect("manifest deserialize");
    assert_eq!(invocation.target, BuildTarget::Application);
    assert_eq!(invocation.inputs.len(), 2);

    let app = &invocation.inputs[0];
    assert_eq!(app.kind, ContainerKind::Directory);
    assert_eq!(app.scopes, Scope::PROJECT);
    assert!(app.output.is_none());

    let feature = &invocation.inputs[1];
    assert_eq!(feature.kind, ContainerKind::Archive);
    assert_eq!(feature.scopes, Scope::ALL);
    assert_eq!(feature.output, Some(PathBuf::from("out/feature.jar")));
}

#[test]
fn target_defaults_to_application() {
    let raw = json!({ "output_root": "out", "inputs": [] });
    let invocation: BuildInvocation = serde_json::from_value(raw).expect("manifest deserialize");
    assert_eq!(invocation.target, BuildTarget::Application);
}

#[test]
fn scopes_serialize_as_names() {
    let value = serde_json::to_value(Scope::PROJECT | Scope::TESTED_CODE).expect("serialize");
    assert_eq!(value, json!(["project", "tested_code"]));
}
