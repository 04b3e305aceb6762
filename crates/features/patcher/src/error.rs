use std::borrow::Cow;
use weave_classfile::ClassFileError;

/// Error types specific to the registry patcher.
#[weave_derive::weave_error]
pub enum PatchError {
    #[error("Registry class could not be processed{}: {source}", format_context(.context))]
    Decode { source: ClassFileError, context: Option<Cow<'static, str>> },

    #[error("Registry class mismatch{}: {message}", format_context(.context))]
    RegistryMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Registration field not found{}: {message}", format_context(.context))]
    FieldNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Initialization routine not found{}: {message}", format_context(.context))]
    RoutineNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Initialization routine has no code{}: {message}", format_context(.context))]
    MissingCode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An instance field cannot be read from a static routine.
    #[error("Static routine cannot reach an instance field{}: {message}", format_context(.context))]
    StaticRoutine { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unsupported registration method{}: {message}", format_context(.context))]
    UnsupportedSignature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
