use std::fs;
use std::path::Path;
use weave_classfile::ClassBuilder;
use weave_container::{Container, EntryName};
use weave_discovery::{Aggregator, DiscoveryError, Scanner, SkipReason, Verdict};
use weave_domain::config::{DiscoveryOrder, WeaveConfig};
use weave_domain::invocation::ContainerKind;
use weave_domain::names::QualifiedName;

const MARKER: &str = "top/clarkding/router/IRouterAct";

fn unit(name: &str, interfaces: &[&str]) -> Vec<u8> {
    interfaces
        .iter()
        .fold(ClassBuilder::new(name), |builder, iface| builder.interface(iface))
        .build()
        .unwrap()
}

fn entry(name: &str) -> EntryName {
    EntryName::try_from(name).unwrap()
}

fn scanner() -> Scanner {
    Scanner::new(&WeaveConfig::default()).unwrap()
}

#[test]
fn direct_implementors_match() {
    let verdict = scanner()
        .classify(
            &entry("top/clarkding/router/feature/HomeAct.class"),
            &unit("top/clarkding/router/feature/HomeAct", &["java/io/Serializable", MARKER]),
        )
        .unwrap();

    assert_eq!(
        verdict,
        Verdict::Match(QualifiedName::parse("top/clarkding/router/feature/HomeAct").unwrap())
    );
}

#[test]
fn transitive_implementors_do_not_match() {
    // extends a class that implements the marker, but does not list it itself
    let bytes = ClassBuilder::new("top/clarkding/router/Child")
        .super_class("top/clarkding/router/Parent")
        .build()
        .unwrap();

    let verdict = scanner().classify(&entry("top/clarkding/router/Child.class"), &bytes).unwrap();
    assert_eq!(verdict, Verdict::NoMatch);
}

#[test]
fn name_filters_run_before_decoding() {
    let scanner = scanner();
    let garbage = b"not a class file";

    assert_eq!(
        scanner.classify(&entry("top/clarkding/router/R$id.class"), garbage).unwrap(),
        Verdict::Skipped(SkipReason::Excluded)
    );
    assert_eq!(
        scanner.classify(&entry("top/clarkding/router/BuildConfig.class"), garbage).unwrap(),
        Verdict::Skipped(SkipReason::Excluded)
    );
    assert_eq!(
        scanner.classify(&entry("com/other/Impl.class"), garbage).unwrap(),
        Verdict::Skipped(SkipReason::OutsidePrefix)
    );
    assert_eq!(
        scanner.classify(&entry("top/clarkding/router/notes.txt"), garbage).unwrap(),
        Verdict::Skipped(SkipReason::NotAUnit)
    );
}

#[test]
fn excluded_units_never_match() {
    let bytes = unit("top/clarkding/router/R", &[MARKER]);
    assert_eq!(
        scanner().classify(&entry("top/clarkding/router/R.class"), &bytes).unwrap(),
        Verdict::Skipped(SkipReason::Excluded)
    );
}

#[test]
fn registry_is_found_outside_the_prefix() {
    let mut config = WeaveConfig::default();
    config.registry.class_name = "com/host/Registry".to_owned();
    let scanner = Scanner::new(&config).unwrap();

    let verdict =
        scanner.classify(&entry("com/host/Registry.class"), &unit("com/host/Registry", &[])).unwrap();
    assert_eq!(verdict, Verdict::Registry);
}

#[test]
fn malformed_units_in_the_prefix_are_fatal() {
    let err = scanner()
        .classify(&entry("top/clarkding/router/Broken.class"), b"\xca\xfe\xba\xbe\x00")
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Malformed { .. }));
    assert!(err.to_string().contains("top/clarkding/router/Broken.class"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = WeaveConfig::default();
    config.scan.exclusions.push("[".to_owned());
    assert!(matches!(Scanner::new(&config), Err(DiscoveryError::InvalidPattern { .. })));

    let mut config = WeaveConfig::default();
    config.marker = String::new();
    assert!(matches!(Scanner::new(&config), Err(DiscoveryError::InvalidName { .. })));
}

fn write(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

#[test]
fn container_scan_records_matches_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "top/clarkding/router/ARouter.class", &unit("top/clarkding/router/ARouter", &[]));
    write(root, "top/clarkding/router/b/Second.class", &unit("top/clarkding/router/b/Second", &[MARKER]));
    write(root, "top/clarkding/router/a/First.class", &unit("top/clarkding/router/a/First", &[MARKER]));
    write(root, "top/clarkding/router/a/Plain.class", &unit("top/clarkding/router/a/Plain", &[]));
    write(root, "top/clarkding/router/a/R.class", b"skipped before decoding");

    let container = Container::open(ContainerKind::Directory, root).unwrap();
    let aggregator = Aggregator::new();
    let stats = scanner().scan(4, &container, &aggregator).unwrap();

    assert_eq!((stats.entries, stats.decoded, stats.matches), (5, 4, 2));

    let snapshot = aggregator.finalize(DiscoveryOrder::ScanOrder);
    let names: Vec<_> = snapshot.names.iter().map(QualifiedName::as_str).collect();
    assert_eq!(names, ["top/clarkding/router/a/First", "top/clarkding/router/b/Second"]);

    let registry = snapshot.registry.unwrap();
    assert_eq!(registry.container, 4);
    assert_eq!(registry.entry.as_str(), "top/clarkding/router/ARouter.class");
}

#[test]
fn container_scan_errors_name_the_entry() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "top/clarkding/router/Broken.class", b"\x00\x01");

    let container = Container::open(ContainerKind::Directory, dir.path()).unwrap();
    let err = scanner().scan(0, &container, &Aggregator::new()).unwrap_err();

    assert!(matches!(err, DiscoveryError::Malformed { .. }));
    assert!(err.to_string().contains("!top/clarkding/router/Broken.class"));
}
