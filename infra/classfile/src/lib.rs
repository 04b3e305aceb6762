//! # Class files
//!
//! Just enough of the JVM class-file format for one job: read the names a class
//! declares, and splice straight-line code into a method without disturbing the
//! rest of the file.
//!
//! * [`ClassHeader::parse`] stops after the interface table and is what scanners use.
//! * [`ClassFile`] keeps every attribute as raw bytes; re-encoding an untouched
//!   class reproduces its input exactly.
//! * [`edit::insert_before_returns`] relocates a `Code` attribute around inserted
//!   bytes, including exception ranges, debug tables and stack map frames.
//!
//! ## Example
//!
//! ```rust
//! use weave_classfile::{ClassBuilder, ClassHeader};
//!
//! let bytes = ClassBuilder::new("a/b/Impl").interface("a/b/Marker").build()?;
//! let header = ClassHeader::parse(&bytes)?;
//! assert_eq!(header.name, "a/b/Impl");
//! assert!(header.implements("a/b/Marker"));
//! # Ok::<(), weave_classfile::ClassFileError>(())
//! ```

mod builder;
mod bytes;
mod class;
mod code;
pub mod descriptor;
pub mod edit;
mod error;
pub mod frames;
pub mod insn;
mod mutf8;
pub mod opcodes;
mod pool;
pub mod stack;

pub use crate::builder::{ClassBuilder, MethodBody};
pub use crate::class::{AccessFlags, Attribute, ClassFile, ClassHeader, MAGIC, Member};
pub use crate::code::{CodeAttribute, ExceptionEntry};
pub use crate::error::{ClassFileError, ClassFileErrorExt};
pub use crate::pool::{Constant, ConstantPool, MemberRef};
