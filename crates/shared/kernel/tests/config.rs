use std::io::Write;
use weave_domain::config::{DiscoveryOrder, WeaveConfig};
use weave_domain::scope::Scope;
use weave_kernel::config::{ConfigError, EnvSource, load_config_from, load_weave_config, validate};

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
        marker = "a/b/Marker"
        workers = 2

        [registry]
        class = "a/b/Registry"

        [scan]
        prefix = "a/b"
        order = "sorted"
        scopes = ["project"]
        "#,
    );

    let cfg = load_weave_config(Some(file.path())).expect("load");
    assert_eq!(cfg.marker, "a/b/Marker");
    assert_eq!(cfg.registry.class_name, "a/b/Registry");
    assert_eq!(cfg.registry.field, "mActRouters");
    assert_eq!(cfg.scan.prefix, "a/b");
    assert_eq!(cfg.scan.order, DiscoveryOrder::Sorted);
    assert_eq!(cfg.scan.scopes, Scope::PROJECT);
    assert_eq!(cfg.workers, 2);
}

#[test]
fn environment_overrides_file() {
    let file = write_config("workers = 2\n[scan]\nprefix = \"a/b\"\n");
    let env: EnvSource = [
        ("WEAVE__WORKERS".to_owned(), "5".to_owned()),
        ("WEAVE__REQUIRE_REGISTRY".to_owned(), "true".to_owned()),
        ("WEAVE__SCAN__EXCLUSIONS".to_owned(), "R,BuildConfig".to_owned()),
    ]
    .into_iter()
    .collect();

    let cfg: WeaveConfig = load_config_from(Some(file.path()), Some(env)).expect("load");
    assert_eq!(cfg.workers, 5);
    assert!(cfg.require_registry);
    assert_eq!(cfg.scan.prefix, "a/b");
    assert_eq!(cfg.scan.exclusions, ["R", "BuildConfig"]);
}

#[test]
fn no_file_yields_defaults() {
    let cfg: WeaveConfig =
        load_config_from(None::<&str>, Some(EnvSource::default())).expect("load");
    assert_eq!(cfg, WeaveConfig::default());
}

#[test]
fn missing_file_is_an_error() {
    let err = load_weave_config(Some("/definitely/not/here/weave.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Config { .. }));
}

#[test]
fn invalid_values_name_their_key() {
    let mut cfg = WeaveConfig::default();
    cfg.workers = 0;
    let err = validate(&cfg).unwrap_err();
    assert!(err.to_string().contains("workers"), "{err}");

    let mut cfg = WeaveConfig::default();
    cfg.marker = "a//B".to_owned();
    let err = validate(&cfg).unwrap_err();
    assert!(err.to_string().contains("marker"), "{err}");
}
