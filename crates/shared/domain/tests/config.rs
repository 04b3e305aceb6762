use serde_json::json;
use weave_domain::config::{DiscoveryOrder, WeaveConfig};
use weave_domain::constants::{DEFAULT_MARKER, DEFAULT_REGISTRY};
use weave_domain::scope::Scope;

#[test]
fn config_defaults_are_sane() {
    let cfg = WeaveConfig::default();
    assert_eq!(cfg.marker, DEFAULT_MARKER);
    assert_eq!(cfg.registry.class_name, DEFAULT_REGISTRY);
    assert_eq!(cfg.registry.routine, "init");
    assert!(cfg.registry.routine_descriptor.is_none());
    assert_eq!(cfg.scan.prefix, "top/clarkding/router");
    assert_eq!(cfg.scan.scopes, Scope::ALL);
    assert_eq!(cfg.scan.order, DiscoveryOrder::ScanOrder);
    assert!(cfg.scan.exclusions.iter().any(|rule| rule == "R$*"));
    assert!(!cfg.require_registry);
    assert!(cfg.workers >= 1);
}

#[test]
fn weave_config_deserializes_partially() {
    let raw = json!({
        "marker": "a/b/Marker",
        "registry": { "class": "a/b/Registry", "field": "table" },
        "scan": { "scopes": ["project", "sub_projects"], "order": "sorted" },
        "require_registry": true,
        "workers": 3
    });

    let cfg: WeaveConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.marker, "a/b/Marker");
    assert_eq!(cfg.registry.class_name, "a/b/Registry");
    assert_eq!(cfg.registry.field, "table");
    assert_eq!(cfg.registry.routine, "init");
    assert_eq!(cfg.scan.scopes, Scope::PROJECT | Scope::SUB_PROJECTS);
    assert_eq!(cfg.scan.order, DiscoveryOrder::Sorted);
    assert_eq!(cfg.scan.prefix, "top/clarkding/router");
    assert!(cfg.require_registry);
    assert_eq!(cfg.workers, 3);
}

#[test]
fn clones_share_until_mutated() {
    let base = WeaveConfig::default();
    let mut tweaked = base.clone();
    tweaked.require_registry = true;

    assert!(!base.require_registry);
    assert!(tweaked.require_registry);
}

#[test]
fn unknown_scope_is_rejected() {
    let raw = json!({ "scan": { "scopes": ["project", "moon"] } });
    assert!(serde_json::from_value::<WeaveConfig>(raw).is_err());
}
