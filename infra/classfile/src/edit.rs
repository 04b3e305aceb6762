//! Inserting straight-line code into an existing method body.

use crate::bytes::{ByteSink, Reader, u16_len};
use crate::class::Attribute;
use crate::code::{CodeAttribute, ExceptionEntry};
use crate::error::ClassFileError;
use crate::frames;
use crate::insn::{self, Layout};
use crate::opcodes::is_return;
use crate::pool::ConstantPool;
use crate::stack;
use tracing::{debug, warn};

const LINE_NUMBERS: &str = "LineNumberTable";
const LOCAL_VARIABLES: &str = "LocalVariableTable";
const LOCAL_VARIABLE_TYPES: &str = "LocalVariableTypeTable";
const TYPE_ANNOTATIONS: [&str; 2] =
    ["RuntimeVisibleTypeAnnotations", "RuntimeInvisibleTypeAnnotations"];

/// Result of [`insert_before_returns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edited {
    pub code: CodeAttribute,
    /// Number of return instructions that received the sequence.
    pub sites: usize,
    /// Nested attributes that could not be relocated and were removed.
    pub dropped: Vec<String>,
}

/// Inserts `sequence` in front of every return instruction of `code`.
///
/// `sequence` must be straight-line code that leaves the operand stack as it found it.
/// Everything that referred to a return (branch and switch targets, exception ranges and
/// handlers, line numbers, local variable ranges, stack map frames) now refers to the start
/// of the inserted bytes. Type annotations on code are dropped. `max_stack` is recomputed
/// and never lowered; `max_locals` is kept.
///
/// # Errors
/// Returns [`ClassFileError`] for malformed code, branches that can no longer reach their
/// target and methods that outgrow the format limits.
pub fn insert_before_returns(
    code: &CodeAttribute,
    pool: &ConstantPool,
    sequence: &[u8],
) -> Result<Edited, ClassFileError> {
    let insns = insn::decode(&code.code)?;
    let insertions: Vec<Option<&[u8]>> = insns
        .iter()
        .map(|l| (!sequence.is_empty() && is_return(l.insn.opcode())).then_some(sequence))
        .collect();
    let sites = insertions.iter().flatten().count();

    if sites == 0 {
        return Ok(Edited { code: code.clone(), sites, dropped: Vec::new() });
    }

    let layout = Layout::compute(&insns, insertions, code.code.len() as u32)?;
    let new_code = layout.encode()?;
    let map = |old: u16| -> Result<u16, ClassFileError> {
        let new = layout.map(u32::from(old))?;
        u16::try_from(new).map_err(|_| ClassFileError::CodeTooLarge { length: new as usize, context: None })
    };

    let exception_table = code
        .exception_table
        .iter()
        .map(|entry| {
            Ok(ExceptionEntry {
                start: map(entry.start)?,
                end: map(entry.end)?,
                handler: map(entry.handler)?,
                catch_type: entry.catch_type,
            })
        })
        .collect::<Result<Vec<_>, ClassFileError>>()?;

    let mut attributes = Vec::with_capacity(code.attributes.len());
    let mut dropped = Vec::new();
    for attribute in &code.attributes {
        let name = pool.utf8(attribute.name)?;
        let info = match name {
            LINE_NUMBERS => relocate_line_numbers(&attribute.info, &map)?,
            LOCAL_VARIABLES | LOCAL_VARIABLE_TYPES => relocate_local_variables(&attribute.info, &map)?,
            frames::NAME => {
                let mut table = frames::decode(&attribute.info)?;
                frames::relocate(&mut table, |old| layout.map(old))?;
                frames::encode(&table)?
            }
            _ if TYPE_ANNOTATIONS.contains(&name) => {
                warn!(attribute = name, "dropping code type annotations that cannot be relocated");
                dropped.push(name.to_owned());
                continue;
            }
            _ => attribute.info.clone(),
        };
        attributes.push(Attribute { name: attribute.name, info });
    }

    let computed = stack::max_stack(&new_code, &exception_table, pool)?;
    let max_stack = code.max_stack.max(computed);
    debug!(sites, old_len = code.code.len(), new_len = new_code.len(), max_stack, "code relocated");

    Ok(Edited {
        code: CodeAttribute {
            max_stack,
            max_locals: code.max_locals,
            code: new_code,
            exception_table,
            attributes,
        },
        sites,
        dropped,
    })
}

type OffsetMap<'a> = dyn Fn(u16) -> Result<u16, ClassFileError> + 'a;

fn relocate_line_numbers(info: &[u8], map: &OffsetMap<'_>) -> Result<Vec<u8>, ClassFileError> {
    let mut reader = Reader::new(info);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(info.len());
    out.put_u16(count);
    for _ in 0..count {
        out.put_u16(map(reader.u16()?)?);
        out.put_u16(reader.u16()?);
    }
    Ok(out)
}

/// Shared by the variable and variable-type tables, which have the same shape.
fn relocate_local_variables(info: &[u8], map: &OffsetMap<'_>) -> Result<Vec<u8>, ClassFileError> {
    let mut reader = Reader::new(info);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(info.len());
    out.put_u16(u16_len(usize::from(count), "local variable")?);
    for _ in 0..count {
        let start = reader.u16()?;
        let length = reader.u16()?;
        let end = start.checked_add(length).ok_or_else(|| {
            ClassFileError::instruction(u32::from(start), "local variable range overflows")
        })?;
        let (new_start, new_end) = (map(start)?, map(end)?);
        out.put_u16(new_start);
        out.put_u16(new_end - new_start);
        out.extend_from_slice(reader.bytes(6)?);
    }
    Ok(out)
}
