//! Well-known names of the router module the stage was first built for.
//! Everything here is only a default; the pipeline reads the values from
//! [`crate::config::WeaveConfig`].

/// Namespace that bounds the scan.
pub const DEFAULT_PREFIX: &str = "top/clarkding/router";

/// Interface implemented by every generated adapter.
pub const DEFAULT_MARKER: &str = "top/clarkding/router/IRouterAct";

/// Class whose initialization routine receives the registrations.
pub const DEFAULT_REGISTRY: &str = "top/clarkding/router/ARouter";

pub const DEFAULT_ROUTINE: &str = "init";
pub const DEFAULT_FIELD: &str = "mActRouters";
pub const DEFAULT_FIELD_DESCRIPTOR: &str = "Ljava/util/Map;";
pub const DEFAULT_METHOD: &str = "putActivity";
pub const DEFAULT_METHOD_DESCRIPTOR: &str = "(Ljava/util/Map;)V";

/// Generated accessory classes that can never be adapters.
pub const DEFAULT_EXCLUSIONS: &[&str] =
    &["R", "R$*", "BuildConfig", "Manifest", "Manifest$*", "module-info", "package-info"];

/// Suffix of compiled units inside a container.
pub const UNIT_SUFFIX: &str = ".class";
