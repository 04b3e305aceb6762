#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros for the weave infrastructure.
//! Today the crate carries a single attribute macro, [`macro@weave_error`], which every
//! pipeline crate uses to declare its error enum.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! weave-derive.workspace = true
//! thiserror.workspace = true
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns an enum into a context-carrying pipeline error.
///
/// # Generated items
///
/// * `#[derive(Debug, thiserror::Error)]` unless the enum already derives them.
/// * `<Name>Ext<T>` trait with `context(..)` and `with_context(..)`, implemented for
///   `Result<T, Name>` and for `Result<T, Source>` of every variant that wraps a source.
/// * `From<Source>` for every variant with a `source` field (or a `#[source]`/`#[from]` field).
/// * `From<&'static str>` and `From<String>` when an `Internal { message, context }` variant exists.
/// * A private `format_context` helper for the `#[error(..)]` strings.
///
/// # Requirements
///
/// Variants must use named fields. A variant wrapping a source must also declare
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[weave_derive::weave_error]
/// pub enum ContainerError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal container error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &std::path::Path) -> Result<Vec<u8>, ContainerError> {
///     std::fs::read(path).with_context(|| format!("Reading {}", path.display()))
/// }
/// ```
#[proc_macro_attribute]
pub fn weave_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}
