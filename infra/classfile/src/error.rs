use std::borrow::Cow;

/// Failures while decoding, editing or encoding a class file.
#[weave_derive::weave_error]
pub enum ClassFileError {
    #[error("Class data ends unexpectedly at byte {offset}{}", format_context(.context))]
    Truncated { offset: usize, context: Option<Cow<'static, str>> },

    #[error("Bad magic number {found:#010x}{}", format_context(.context))]
    BadMagic { found: u32, context: Option<Cow<'static, str>> },

    #[error("Invalid constant{}: {message}", format_context(.context))]
    InvalidConstant { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid instruction at {offset}{}: {message}", format_context(.context))]
    InvalidInstruction {
        offset: u32,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// A conditional branch no longer reaches its target with a 16-bit offset.
    #[error("Branch at {offset} is out of range after relayout{}", format_context(.context))]
    BranchOutOfRange { offset: u32, context: Option<Cow<'static, str>> },

    #[error("Method code grew to {length} bytes{}", format_context(.context))]
    CodeTooLarge { length: usize, context: Option<Cow<'static, str>> },

    #[error("Inconsistent operand stack at {offset}{}: {message}", format_context(.context))]
    InconsistentStack {
        offset: u32,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Constant pool is full{}", format_context(.context))]
    PoolOverflow { context: Option<Cow<'static, str>> },

    #[error("Class file error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ClassFileError {
    pub(crate) fn constant(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConstant { message: message.into(), context: None }
    }

    pub(crate) fn instruction(offset: u32, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidInstruction { offset, message: message.into(), context: None }
    }

    pub(crate) fn stack(offset: u32, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InconsistentStack { offset, message: message.into(), context: None }
    }
}
