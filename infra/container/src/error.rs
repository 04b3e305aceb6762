use std::borrow::Cow;

/// A specialized [`ContainerError`] enum of this crate.
#[weave_derive::weave_error]
pub enum ContainerError {
    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Archive failure{}: {source}", format_context(.context))]
    Archive { source: zip::result::ZipError, context: Option<Cow<'static, str>> },

    #[error("Invalid entry name{}: {message}", format_context(.context))]
    InvalidEntry { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Entry not found{}: {message}", format_context(.context))]
    EntryNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
