//! Operand stack height analysis.

use crate::code::ExceptionEntry;
use crate::descriptor::{MethodDescriptor, field_slots};
use crate::error::ClassFileError;
use crate::insn::{self, Instruction, Located};
use crate::opcodes::{
    GETFIELD, GETSTATIC, GOTO, GOTO_W, IFNONNULL, IFNULL, INVOKEDYNAMIC, INVOKEINTERFACE,
    INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL, JSR, JSR_W, MULTIANEWARRAY, PUTFIELD, PUTSTATIC,
    RET, WIDE, ends_block,
};
use crate::pool::ConstantPool;

/// Deepest operand stack any path through `code` reaches.
///
/// Exception handlers start with the thrown value on the stack. Paths that merge
/// with different heights keep the larger one.
///
/// # Errors
/// Returns [`ClassFileError::InconsistentStack`] when an instruction would pop an empty stack,
/// and decode errors for malformed code or pool references.
pub fn max_stack(
    code: &[u8],
    handlers: &[ExceptionEntry],
    pool: &ConstantPool,
) -> Result<u16, ClassFileError> {
    let insns = insn::decode(code)?;
    if insns.is_empty() {
        return Ok(0);
    }

    let index_of = |offset: u32| {
        insns
            .binary_search_by_key(&offset, |l| l.offset)
            .map_err(|_| ClassFileError::stack(offset, "jump into the middle of an instruction"))
    };

    let mut heights: Vec<Option<u32>> = vec![None; insns.len()];
    let mut pending = vec![(0usize, 0u32)];
    for handler in handlers {
        pending.push((index_of(u32::from(handler.handler))?, 1));
    }

    let mut deepest = 0;
    while let Some((at, height)) = pending.pop() {
        if heights[at].is_some_and(|known| known >= height) {
            continue;
        }
        heights[at] = Some(height);

        let located = &insns[at];
        let (pops, pushes) = effect(located, pool)?;
        let after = height.checked_sub(pops).ok_or_else(|| {
            ClassFileError::stack(located.offset, format!("pops {pops} with only {height} on the stack"))
        })? + pushes;
        if after > u32::from(u16::MAX) {
            return Err(ClassFileError::stack(located.offset, "stack grows without bound"));
        }
        deepest = deepest.max(after).max(height);

        let opcode = located.insn.opcode();
        match &located.insn {
            Instruction::Branch { opcode: JSR | JSR_W, target } => {
                pending.push((index_of(*target)?, after));
                // the subroutine returns here with the address consumed
                if at + 1 < insns.len() {
                    pending.push((at + 1, height));
                }
                continue;
            }
            insn => {
                for target in insn.targets() {
                    pending.push((index_of(target)?, after));
                }
            }
        }

        if !ends_block(opcode) && at + 1 < insns.len() {
            pending.push((at + 1, after));
        }
    }

    Ok(deepest as u16)
}

/// Slots popped and pushed by one instruction.
fn effect(located: &Located, pool: &ConstantPool) -> Result<(u32, u32), ClassFileError> {
    let Instruction::Plain { bytes } = &located.insn else {
        return Ok(match located.insn.opcode() {
            JSR | JSR_W => (0, 1),
            GOTO | GOTO_W => (0, 0),
            0x9f..=0xa6 => (2, 0),
            // single-operand ifs and switches
            _ => (1, 0),
        });
    };

    let operand = || u16::from_be_bytes([bytes[1], bytes[2]]);
    let opcode = bytes[0];

    let effect = match opcode {
        GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => {
            let slots = u32::from(field_slots(pool.member_ref(operand())?.descriptor)?);
            match opcode {
                GETSTATIC => (0, slots),
                PUTSTATIC => (slots, 0),
                GETFIELD => (1, slots),
                _ => (1 + slots, 0),
            }
        }
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE | INVOKEDYNAMIC => {
            let descriptor = if opcode == INVOKEDYNAMIC {
                pool.dynamic_descriptor(operand())?
            } else {
                pool.member_ref(operand())?.descriptor
            };
            let method = MethodDescriptor::parse(descriptor)?;
            let receiver = u32::from(!matches!(opcode, INVOKESTATIC | INVOKEDYNAMIC));
            (receiver + u32::from(method.param_slots()), u32::from(method.returns))
        }
        MULTIANEWARRAY => (u32::from(bytes[3]), 1),
        WIDE => fixed(bytes[1]),
        RET => (0, 0),
        other => fixed(other),
    };
    Ok(effect)
}

/// Effects that depend on the opcode alone.
const fn fixed(opcode: u8) -> (u32, u32) {
    match opcode {
        0x01..=0x08 | 0x0b..=0x0d | 0x10..=0x13 | 0x15 | 0x17 | 0x19 | 0x1a..=0x1d
        | 0x22..=0x25 | 0x2a..=0x2d | 0xbb => (0, 1),
        0x09 | 0x0a | 0x0e | 0x0f | 0x14 | 0x16 | 0x18 | 0x1e..=0x21 | 0x26..=0x29 => (0, 2),
        0x2e | 0x30 | 0x32..=0x35 => (2, 1),
        0x2f | 0x31 => (2, 2),
        0x36 | 0x38 | 0x3a | 0x3b..=0x3e | 0x43..=0x46 | 0x4b..=0x4e => (1, 0),
        0x37 | 0x39 | 0x3f..=0x42 | 0x47..=0x4a => (2, 0),
        0x4f | 0x51 | 0x53..=0x56 => (3, 0),
        0x50 | 0x52 => (4, 0),
        0x57 => (1, 0),
        0x58 => (2, 0),
        0x59 => (1, 2),
        0x5a => (2, 3),
        0x5b => (3, 4),
        0x5c => (2, 4),
        0x5d => (3, 5),
        0x5e => (4, 6),
        0x5f => (2, 2),
        // add/sub/mul/div/rem: int and float take 2 -> 1, long and double 4 -> 2
        0x60..=0x73 => {
            if opcode % 2 == 0 { (2, 1) } else { (4, 2) }
        }
        0x74 | 0x76 => (1, 1),
        0x75 | 0x77 => (2, 2),
        0x78 | 0x7a | 0x7c => (2, 1),
        0x79 | 0x7b | 0x7d => (3, 2),
        0x7e | 0x80 | 0x82 => (2, 1),
        0x7f | 0x81 | 0x83 => (4, 2),
        0x85 | 0x87 | 0x8c | 0x8d => (1, 2),
        0x86 | 0x8b | 0x91..=0x93 | 0xbc..=0xbe | 0xc0 | 0xc1 => (1, 1),
        0x88 | 0x89 | 0x8e | 0x90 => (2, 1),
        0x8a | 0x8f => (2, 2),
        0x94 | 0x97 | 0x98 => (4, 1),
        0x95 | 0x96 => (2, 1),
        0xac | 0xae | 0xb0 | 0xbf | 0xc2 | 0xc3 => (1, 0),
        0xad | 0xaf => (2, 0),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{ALOAD_0, ARETURN, DUP, IFEQ, LRETURN, NEW, POP, RETURN};

    #[test]
    fn straight_line_code() {
        let mut pool = ConstantPool::new();
        let init = pool.method_ref_index("a/B", "<init>", "()V").unwrap().to_be_bytes();
        let class = pool.class_index("a/B").unwrap().to_be_bytes();
        let code = [NEW, class[0], class[1], DUP, INVOKESPECIAL, init[0], init[1], ARETURN];
        assert_eq!(max_stack(&code, &[], &pool).unwrap(), 2);
    }

    #[test]
    fn wide_values_count_twice() {
        let pool = ConstantPool::new();
        // lconst_1; lconst_1; ladd; lreturn
        assert_eq!(max_stack(&[0x0a, 0x0a, 0x61, LRETURN], &[], &pool).unwrap(), 4);
    }

    #[test]
    fn branches_merge_to_the_deeper_path() {
        let pool = ConstantPool::new();
        // 0: iconst_0; 1: ifeq -> 8; 4: aload_0; 5: pop; 6: nop; 7: nop; 8: return
        let code = [0x03, IFEQ, 0, 7, ALOAD_0, POP, 0x00, 0x00, RETURN];
        assert_eq!(max_stack(&code, &[], &pool).unwrap(), 1);
        let code = [GOTO, 0, 3, RETURN];
        assert_eq!(max_stack(&code, &[], &pool).unwrap(), 0);
    }

    #[test]
    fn handlers_start_with_the_exception() {
        let pool = ConstantPool::new();
        // 0: return; 1: astore_1 (handler); 2: return
        let handlers = [ExceptionEntry { start: 0, end: 1, handler: 1, catch_type: 0 }];
        assert_eq!(max_stack(&[RETURN, 0x4c, RETURN], &handlers, &pool).unwrap(), 1);
    }

    #[test]
    fn underflow_is_inconsistent() {
        let pool = ConstantPool::new();
        let err = max_stack(&[POP, RETURN], &[], &pool).unwrap_err();
        assert!(matches!(err, ClassFileError::InconsistentStack { offset: 0, .. }));
    }
}
