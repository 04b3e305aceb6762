use std::borrow::Cow;
use weave_classfile::ClassFileError;
use weave_container::ContainerError;
use weave_domain::names::NameError;

/// Error types specific to the discovery feature.
#[weave_derive::weave_error]
pub enum DiscoveryError {
    /// A unit inside the scanned namespace could not be decoded.
    #[error("Malformed unit{}: {source}", format_context(.context))]
    Malformed { source: ClassFileError, context: Option<Cow<'static, str>> },

    #[error("Invalid exclusion pattern{}: {source}", format_context(.context))]
    InvalidPattern { source: globset::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid qualified name{}: {source}", format_context(.context))]
    InvalidName { source: NameError, context: Option<Cow<'static, str>> },

    #[error("Container access failed{}: {source}", format_context(.context))]
    Container { source: ContainerError, context: Option<Cow<'static, str>> },
}
