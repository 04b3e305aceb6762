use std::fs;
use std::path::Path;
use std::time::Duration;
use weave_container::{Container, ContainerError, EntryName, purge_temps_older_than};
use weave_domain::invocation::ContainerKind;

fn populate(root: &Path) {
    for (name, data) in [
        ("b/Z.class", &b"z"[..]),
        ("a/Y.class", b"y"),
        ("a/X.class", b"x"),
        ("a/inner/W.class", b"w"),
    ] {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
}

fn names(container: &Container) -> Vec<String> {
    let mut names = Vec::new();
    container
        .scan(|name, _| {
            names.push(name.to_string());
            Ok::<(), ContainerError>(())
        })
        .unwrap();
    names
}

#[test]
fn scan_is_sorted_by_file_name() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let container = Container::open(ContainerKind::Directory, dir.path()).unwrap();
    assert_eq!(names(&container), ["a/X.class", "a/Y.class", "a/inner/W.class", "b/Z.class"]);
}

#[test]
fn forward_replaces_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("classes");
    populate(&input);
    let output = dir.path().join("out");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("Stale.class"), b"old").unwrap();

    Container::open(ContainerKind::Directory, &input).unwrap().forward(&output).unwrap();

    let forwarded = Container::open(ContainerKind::Directory, &output).unwrap();
    assert_eq!(names(&forwarded), names(&Container::open(ContainerKind::Directory, &input).unwrap()));
    assert_eq!(fs::read(output.join("a/inner/W.class")).unwrap(), b"w");
}

#[test]
fn replace_swaps_one_file() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let container = Container::open(ContainerKind::Directory, dir.path()).unwrap();

    let entry = EntryName::try_from("a/X.class").unwrap();
    container.replace(&entry, b"patched").unwrap();
    assert_eq!(container.read(&entry).unwrap(), b"patched");
    assert_eq!(fs::read_dir(dir.path().join("a")).unwrap().count(), 3);

    let missing = EntryName::try_from("a/Nope.class").unwrap();
    assert!(matches!(container.replace(&missing, b"x"), Err(ContainerError::EntryNotFound { .. })));
}

#[tokio::test]
async fn stale_temps_are_purged() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    fs::write(dir.path().join("a/app.jar.weavetmp.3"), b"junk").unwrap();
    fs::write(dir.path().join("b/keep.txt"), b"keep").unwrap();

    assert_eq!(purge_temps_older_than(dir.path(), Duration::from_secs(3600)).await, 0);
    assert_eq!(purge_temps_older_than(dir.path(), Duration::ZERO).await, 1);

    assert!(!dir.path().join("a/app.jar.weavetmp.3").exists());
    assert!(dir.path().join("b/keep.txt").exists());
    assert!(dir.path().join("a/X.class").exists());
}
