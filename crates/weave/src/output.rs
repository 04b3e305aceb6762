//! Where forwarded containers land.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use weave_domain::invocation::{ContainerInput, ContainerKind};

const ARCHIVES: &str = "archives";
const DIRECTORIES: &str = "directories";

/// Maps each input container to its output location.
pub trait OutputResolver: Debug + Send + Sync {
    /// Output location of input `index`. Must be distinct for distinct inputs.
    fn resolve(&self, index: usize, input: &ContainerInput) -> PathBuf;
}

/// The default layout below an output root:
/// `<root>/archives/<index>-<name>.jar` and `<root>/directories/<index>-<name>/`.
///
/// An explicit `output` on the input always wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputResolver for OutputLayout {
    fn resolve(&self, index: usize, input: &ContainerInput) -> PathBuf {
        if let Some(explicit) = &input.output {
            return explicit.clone();
        }
        let name = sanitize(&input.name);
        match input.kind {
            ContainerKind::Archive => self.root.join(ARCHIVES).join(format!("{index}-{name}.jar")),
            ContainerKind::Directory => self.root.join(DIRECTORIES).join(format!("{index}-{name}")),
        }
    }
}

/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() { "container".to_owned() } else { cleaned.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_separates_kinds_and_prefixes_the_index() {
        let layout = OutputLayout::new("/out");
        let jar = ContainerInput::new("feature", "/in/feature.jar", ContainerKind::Archive);
        let dir = ContainerInput::new("app", "/in/classes", ContainerKind::Directory);

        assert_eq!(layout.resolve(0, &jar), Path::new("/out/archives/0-feature.jar"));
        assert_eq!(layout.resolve(7, &dir), Path::new("/out/directories/7-app"));
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize(":app:debug/classes"), "_app_debug_classes");
        assert_eq!(sanitize("lib-1.2.jar"), "lib-1.2.jar");
        assert_eq!(sanitize(".."), "container");
        assert_eq!(sanitize(""), "container");
    }

    #[test]
    fn explicit_output_wins() {
        let layout = OutputLayout::new("/out");
        let input = ContainerInput::new("feature", "/in/f.jar", ContainerKind::Archive)
            .with_output("/elsewhere/f.jar");
        assert_eq!(layout.resolve(0, &input), Path::new("/elsewhere/f.jar"));
    }
}
