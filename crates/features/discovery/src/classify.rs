//! Stateless predicates the scanner composes, one per classification step.

use globset::GlobSet;
use weave_classfile::ClassHeader;
use weave_container::EntryName;
use weave_domain::constants::UNIT_SUFFIX;
use weave_domain::names::QualifiedName;

/// Whether the entry holds a compiled unit.
#[must_use]
pub fn is_unit_entry(entry: &EntryName) -> bool {
    entry.as_str().ends_with(UNIT_SUFFIX)
}

/// Unit name without package or suffix, e.g. `R$string` for `a/b/R$string.class`.
#[must_use]
pub fn simple_name(entry: &EntryName) -> &str {
    let file = entry.file_name();
    file.strip_suffix(UNIT_SUFFIX).unwrap_or(file)
}

/// Whether any exclusion rule matches the unit's simple name.
#[must_use]
pub fn is_excluded(exclusions: &GlobSet, entry: &EntryName) -> bool {
    exclusions.is_match(simple_name(entry))
}

/// Whether the entry lies inside the namespace `prefix` (`/`-separated, no trailing slash).
///
/// Matching is per segment: `a/b` covers `a/b/C.class` but not `a/bc/D.class`.
/// An empty prefix covers everything.
#[must_use]
pub fn within_prefix(prefix: &str, entry: &EntryName) -> bool {
    if prefix.is_empty() {
        return true;
    }
    entry
        .as_str()
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether the unit lists `marker` among its direct interfaces.
#[must_use]
pub fn declares_marker(header: &ClassHeader, marker: &QualifiedName) -> bool {
    header.implements(marker.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::{Glob, GlobSetBuilder};

    fn entry(name: &str) -> EntryName {
        EntryName::try_from(name).unwrap()
    }

    #[test]
    fn units_are_class_files() {
        assert!(is_unit_entry(&entry("a/B.class")));
        assert!(!is_unit_entry(&entry("a/B.kotlin_module")));
        assert!(!is_unit_entry(&entry("META-INF/MANIFEST.MF")));
    }

    #[test]
    fn exclusions_match_the_simple_name() {
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("R").unwrap());
        builder.add(Glob::new("R$*").unwrap());
        let set = builder.build().unwrap();

        assert!(is_excluded(&set, &entry("a/b/R.class")));
        assert!(is_excluded(&set, &entry("a/b/R$string.class")));
        assert!(!is_excluded(&set, &entry("a/b/Router.class")));
        assert!(!is_excluded(&set, &entry("R/Main.class")));
    }

    #[test]
    fn prefix_is_segment_aware() {
        assert!(within_prefix("top/router", &entry("top/router/Main.class")));
        assert!(within_prefix("top/router", &entry("top/router/deep/Main.class")));
        assert!(!within_prefix("top/router", &entry("top/routerx/Main.class")));
        assert!(!within_prefix("top/router", &entry("other/Main.class")));
        assert!(within_prefix("", &entry("Main.class")));
    }
}
