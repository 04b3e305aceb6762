use crate::bytes::{ByteSink, Reader, u16_len, u32_len};
use crate::class::Attribute;
use crate::error::ClassFileError;

/// One row of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start: u16,
    /// Exclusive; may equal the code length.
    pub end: u16,
    pub handler: u16,
    /// Pool index of the caught class, `0` for `finally`.
    pub catch_type: u16,
}

/// The body of a `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes (line numbers, local variables, stack map, ...).
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Name of the attribute this struct decodes.
    pub const NAME: &'static str = "Code";

    /// # Errors
    /// Returns [`ClassFileError::Truncated`] when `info` ends early.
    pub fn decode(info: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = Reader::new(info);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let len = reader.u32()? as usize;
        let code = reader.bytes(len)?.to_vec();

        let count = reader.u16()?;
        let exception_table = (0..count)
            .map(|_| {
                Ok(ExceptionEntry {
                    start: reader.u16()?,
                    end: reader.u16()?,
                    handler: reader.u16()?,
                    catch_type: reader.u16()?,
                })
            })
            .collect::<Result<_, ClassFileError>>()?;

        let attributes = Attribute::decode_all(&mut reader)?;
        Ok(Self { max_stack, max_locals, code, exception_table, attributes })
    }

    /// # Errors
    /// Returns [`ClassFileError::Internal`] when a table outgrows its length field.
    pub fn encode(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut out = Vec::with_capacity(self.code.len() + 32);
        out.put_u16(self.max_stack);
        out.put_u16(self.max_locals);
        out.put_u32(u32_len(self.code.len(), "code")?);
        out.extend_from_slice(&self.code);
        out.put_u16(u16_len(self.exception_table.len(), "exception table")?);
        for entry in &self.exception_table {
            out.put_u16(entry.start);
            out.put_u16(entry.end);
            out.put_u16(entry.handler);
            out.put_u16(entry.catch_type);
        }
        Attribute::encode_all(&self.attributes, &mut out)?;
        Ok(out)
    }
}
