//! Instruction decoding and relocating re-encoding.
//!
//! Branch and switch targets are held as absolute offsets into the code the
//! instructions were decoded from. [`Layout`] places the instructions (plus any
//! inserted bytes) at new offsets and re-encodes every target through the
//! resulting offset map.

use crate::bytes::{ByteSink, Reader};
use crate::error::ClassFileError;
use crate::opcodes::{
    GOTO, GOTO_W, JSR, JSR_W, LOOKUPSWITCH, TABLESWITCH, WIDE, IINC, is_short_branch, is_widenable,
    operand_len,
};

/// Longest method body the format allows.
pub const MAX_CODE_LEN: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Any instruction without a code offset operand; `bytes` includes the opcode.
    Plain { bytes: Vec<u8> },
    /// Conditional or unconditional branch, including `goto_w`/`jsr_w`.
    Branch { opcode: u8, target: u32 },
    TableSwitch { default: u32, low: i32, high: i32, targets: Vec<u32> },
    LookupSwitch { default: u32, pairs: Vec<(i32, u32)> },
}

impl Instruction {
    #[must_use]
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Plain { bytes } => bytes[0],
            Self::Branch { opcode, .. } => *opcode,
            Self::TableSwitch { .. } => TABLESWITCH,
            Self::LookupSwitch { .. } => LOOKUPSWITCH,
        }
    }

    /// Offsets this instruction can transfer control to.
    #[must_use]
    pub fn targets(&self) -> Vec<u32> {
        match self {
            Self::Plain { .. } => Vec::new(),
            Self::Branch { target, .. } => vec![*target],
            Self::TableSwitch { default, targets, .. } => {
                std::iter::once(*default).chain(targets.iter().copied()).collect()
            }
            Self::LookupSwitch { default, pairs } => {
                std::iter::once(*default).chain(pairs.iter().map(|(_, t)| *t)).collect()
            }
        }
    }

    fn size(&self, at: u32, wide_branch: bool) -> u32 {
        match self {
            Self::Plain { bytes } => bytes.len() as u32,
            Self::Branch { .. } if wide_branch => 5,
            Self::Branch { .. } => 3,
            Self::TableSwitch { targets, .. } => 1 + padding(at) + 12 + 4 * targets.len() as u32,
            Self::LookupSwitch { pairs, .. } => 1 + padding(at) + 8 + 8 * pairs.len() as u32,
        }
    }
}

/// An instruction and the offset it was decoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub offset: u32,
    pub insn: Instruction,
}

const fn padding(at: u32) -> u32 {
    (4 - (at + 1) % 4) % 4
}

/// Decodes a method body.
///
/// # Errors
/// Returns [`ClassFileError::InvalidInstruction`] for undefined opcodes, truncated operands
/// and targets that are not instruction boundaries.
pub fn decode(code: &[u8]) -> Result<Vec<Located>, ClassFileError> {
    if code.len() > MAX_CODE_LEN {
        return Err(ClassFileError::CodeTooLarge { length: code.len(), context: None });
    }

    let mut reader = Reader::new(code);
    let mut out = Vec::new();

    while !reader.is_empty() {
        let offset = reader.position() as u32;
        let insn = decode_one(&mut reader, offset)
            .map_err(|err| match err {
                ClassFileError::Truncated { .. } => ClassFileError::instruction(offset, "truncated operands"),
                other => other,
            })?;
        out.push(Located { offset, insn });
    }

    for located in &out {
        for target in located.insn.targets() {
            if out.binary_search_by_key(&target, |l| l.offset).is_err() {
                return Err(ClassFileError::instruction(
                    located.offset,
                    format!("target {target} is not an instruction boundary"),
                ));
            }
        }
    }

    Ok(out)
}

fn decode_one(reader: &mut Reader<'_>, offset: u32) -> Result<Instruction, ClassFileError> {
    let start = reader.position();
    let opcode = reader.u8()?;
    let relative = |delta: i32| -> Result<u32, ClassFileError> {
        u32::try_from(i64::from(offset) + i64::from(delta))
            .map_err(|_| ClassFileError::instruction(offset, "negative branch target"))
    };

    let insn = match opcode {
        op if is_short_branch(op) => Instruction::Branch { opcode, target: relative(i32::from(reader.i16()?))? },
        GOTO_W | JSR_W => Instruction::Branch { opcode, target: relative(reader.i32()?)? },
        TABLESWITCH => {
            reader.skip(padding(offset) as usize)?;
            let default = relative(reader.i32()?)?;
            let low = reader.i32()?;
            let high = reader.i32()?;
            if high < low {
                return Err(ClassFileError::instruction(offset, "tableswitch high is below low"));
            }
            let count = i64::from(high) - i64::from(low) + 1;
            let targets = (0..count).map(|_| relative(reader.i32()?)).collect::<Result<_, _>>()?;
            Instruction::TableSwitch { default, low, high, targets }
        }
        LOOKUPSWITCH => {
            reader.skip(padding(offset) as usize)?;
            let default = relative(reader.i32()?)?;
            let count = reader.i32()?;
            if count < 0 {
                return Err(ClassFileError::instruction(offset, "negative lookupswitch pair count"));
            }
            let pairs = (0..count)
                .map(|_| Ok((reader.i32()?, relative(reader.i32()?)?)))
                .collect::<Result<_, ClassFileError>>()?;
            Instruction::LookupSwitch { default, pairs }
        }
        WIDE => {
            let modified = reader.u8()?;
            if !is_widenable(modified) {
                return Err(ClassFileError::instruction(offset, format!("wide cannot modify {modified:#04x}")));
            }
            reader.skip(if modified == IINC { 4 } else { 2 })?;
            Instruction::Plain { bytes: reader.since(start).to_vec() }
        }
        op => {
            let len = operand_len(op)
                .ok_or_else(|| ClassFileError::instruction(offset, format!("undefined opcode {op:#04x}")))?;
            reader.skip(len)?;
            Instruction::Plain { bytes: reader.since(start).to_vec() }
        }
    };
    Ok(insn)
}

/// New positions for a decoded method body with bytes inserted before some instructions.
///
/// Any offset that referred to an instruction with an insertion now refers to the
/// start of the inserted bytes.
#[derive(Debug, Clone)]
pub struct Layout<'a> {
    insns: &'a [Located],
    insertions: Vec<Option<&'a [u8]>>,
    old_len: u32,
    /// New offset of the insertion (or the instruction itself) for each instruction.
    block_starts: Vec<u32>,
    starts: Vec<u32>,
    wide: Vec<bool>,
    new_len: u32,
}

impl<'a> Layout<'a> {
    /// Places `insns` (decoded from code of `old_len` bytes), inserting
    /// `insertions[i]` in front of instruction `i`.
    ///
    /// `goto` and `jsr` become `goto_w` and `jsr_w` when their target drifts out of 16-bit
    /// range.
    ///
    /// # Errors
    /// Returns [`ClassFileError::BranchOutOfRange`] for conditional branches that no longer reach,
    /// and [`ClassFileError::CodeTooLarge`] when the result exceeds the format limit.
    pub fn compute(
        insns: &'a [Located],
        insertions: Vec<Option<&'a [u8]>>,
        old_len: u32,
    ) -> Result<Self, ClassFileError> {
        debug_assert_eq!(insns.len(), insertions.len());
        let wide = insns
            .iter()
            .map(|l| matches!(l.insn, Instruction::Branch { opcode: GOTO_W | JSR_W, .. }))
            .collect();

        let mut layout = Self {
            insns,
            insertions,
            old_len,
            block_starts: vec![0; insns.len()],
            starts: vec![0; insns.len()],
            wide,
            new_len: 0,
        };

        loop {
            layout.place()?;
            if !layout.promote()? {
                return Ok(layout);
            }
        }
    }

    fn place(&mut self) -> Result<(), ClassFileError> {
        let mut pos: usize = 0;
        for (i, located) in self.insns.iter().enumerate() {
            self.block_starts[i] = pos as u32;
            pos += self.insertions[i].map_or(0, <[u8]>::len);
            self.starts[i] = pos as u32;
            pos += located.insn.size(pos as u32, self.wide[i]) as usize;
            if pos > MAX_CODE_LEN {
                return Err(ClassFileError::CodeTooLarge { length: pos, context: None });
            }
        }
        self.new_len = pos as u32;
        Ok(())
    }

    /// Widens unconditional branches that no longer fit. Returns whether anything changed.
    fn promote(&mut self) -> Result<bool, ClassFileError> {
        let mut changed = false;
        for i in 0..self.insns.len() {
            let Instruction::Branch { opcode, target } = self.insns[i].insn else { continue };
            if self.wide[i] {
                continue;
            }
            let delta = i64::from(self.map(target)?) - i64::from(self.starts[i]);
            if i16::try_from(delta).is_ok() {
                continue;
            }
            if matches!(opcode, GOTO | JSR) {
                self.wide[i] = true;
                changed = true;
            } else {
                return Err(ClassFileError::BranchOutOfRange {
                    offset: self.insns[i].offset,
                    context: None,
                });
            }
        }
        Ok(changed)
    }

    /// Maps an offset of the original code to the new code. The original code length maps
    /// to the new code length.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidInstruction`] when `old` is not an instruction boundary.
    pub fn map(&self, old: u32) -> Result<u32, ClassFileError> {
        if old == self.old_len {
            return Ok(self.new_len);
        }
        self.insns
            .binary_search_by_key(&old, |l| l.offset)
            .map(|i| self.block_starts[i])
            .map_err(|_| ClassFileError::instruction(old, "offset is not an instruction boundary"))
    }

    #[must_use]
    pub const fn new_len(&self) -> u32 {
        self.new_len
    }

    /// Writes the relocated method body.
    ///
    /// # Errors
    /// Fails only if a target is not an instruction boundary.
    pub fn encode(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut out = Vec::with_capacity(self.new_len as usize);

        for (i, located) in self.insns.iter().enumerate() {
            if let Some(bytes) = self.insertions[i] {
                out.extend_from_slice(bytes);
            }
            let at = self.starts[i];
            debug_assert_eq!(out.len() as u32, at);
            let rel = |target: u32| -> Result<i32, ClassFileError> {
                Ok((i64::from(self.map(target)?) - i64::from(at)) as i32)
            };

            match &located.insn {
                Instruction::Plain { bytes } => out.extend_from_slice(bytes),
                Instruction::Branch { opcode, target } => {
                    let delta = rel(*target)?;
                    if self.wide[i] {
                        out.put_u8(match *opcode {
                            GOTO => GOTO_W,
                            JSR => JSR_W,
                            other => other,
                        });
                        out.put_i32(delta);
                    } else {
                        out.put_u8(*opcode);
                        out.put_i16(delta as i16);
                    }
                }
                Instruction::TableSwitch { default, low, high, targets } => {
                    out.put_u8(TABLESWITCH);
                    out.resize(out.len() + padding(at) as usize, 0);
                    out.put_i32(rel(*default)?);
                    out.put_i32(*low);
                    out.put_i32(*high);
                    for target in targets {
                        out.put_i32(rel(*target)?);
                    }
                }
                Instruction::LookupSwitch { default, pairs } => {
                    out.put_u8(LOOKUPSWITCH);
                    out.resize(out.len() + padding(at) as usize, 0);
                    out.put_i32(rel(*default)?);
                    out.put_i32(pairs.len() as i32);
                    for (key, target) in pairs {
                        out.put_i32(*key);
                        out.put_i32(rel(*target)?);
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{IFEQ, NOP, RETURN};

    fn relayout(code: &[u8], insert_at: &[(u32, &[u8])]) -> Result<Vec<u8>, ClassFileError> {
        let insns = decode(code)?;
        let insertions = insns
            .iter()
            .map(|l| insert_at.iter().find(|(at, _)| *at == l.offset).map(|(_, b)| *b))
            .collect();
        Layout::compute(&insns, insertions, code.len() as u32)?.encode()
    }

    #[test]
    fn untouched_code_reencodes_verbatim() {
        // 0: iconst_0; 1: tableswitch 0..1; 24..26: return x3
        let mut code = vec![0x03, TABLESWITCH, 0, 0];
        code.extend_from_slice(&25i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&23i32.to_be_bytes());
        code.extend_from_slice(&24i32.to_be_bytes());
        code.extend_from_slice(&[RETURN, RETURN, RETURN]);

        assert_eq!(relayout(&code, &[]).unwrap(), code);
    }

    #[test]
    fn branches_to_a_return_land_on_the_insertion() {
        // 0: ifeq +4 -> 4; 3: nop; 4: return
        let code = [IFEQ, 0, 4, NOP, RETURN];
        let sequence: &[u8] = &[NOP, NOP];
        let out = relayout(&code, &[(4, sequence)]).unwrap();
        assert_eq!(out, [IFEQ, 0, 4, NOP, NOP, NOP, RETURN]);
    }

    #[test]
    fn switch_padding_follows_new_position() {
        // 0: nop; 1: lookupswitch pad2 default->12 npairs 0; 12: return
        let mut code = vec![NOP, LOOKUPSWITCH, 0, 0];
        code.extend_from_slice(&11i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.push(RETURN);
        assert_eq!(decode(&code).unwrap().len(), 3);

        let sequence: &[u8] = &[NOP];
        let out = relayout(&code, &[(0, sequence)]).unwrap();
        // switch now at 2, padding 1, default -> new return at 12
        assert_eq!(out[2], LOOKUPSWITCH);
        assert_eq!(out[3], 0);
        assert_eq!(i32::from_be_bytes([out[4], out[5], out[6], out[7]]), 10);
        assert_eq!(out.len(), 13);
    }

    #[test]
    fn goto_is_widened_when_out_of_range() {
        // 0: goto +4 -> 4 (past the nop); 3: nop; 4: return, with a huge insertion before 3
        static FILLER: [u8; 40_000] = [NOP; 40_000];
        let code = [GOTO, 0, 4, NOP, RETURN];
        let filler: &[u8] = &FILLER;
        let out = relayout(&code, &[(3, filler)]).unwrap();
        assert_eq!(out[0], GOTO_W);
        let delta = i32::from_be_bytes([out[1], out[2], out[3], out[4]]);
        assert_eq!(delta as usize, 5 + FILLER.len() + 1);
    }

    #[test]
    fn conditional_out_of_range_is_an_error() {
        static FILLER: [u8; 40_000] = [NOP; 40_000];
        let code = [IFEQ, 0, 4, NOP, RETURN];
        let filler: &[u8] = &FILLER;
        let err = relayout(&code, &[(3, filler)]).unwrap_err();
        assert!(matches!(err, ClassFileError::BranchOutOfRange { offset: 0, .. }));
    }

    #[test]
    fn malformed_code_is_rejected() {
        assert!(decode(&[0xca]).is_err());
        assert!(decode(&[GOTO, 0]).is_err());
        assert!(decode(&[GOTO, 0, 2, RETURN]).is_err());
        assert!(decode(&[WIDE, 0x10, 0, 0]).is_err());
    }
}
