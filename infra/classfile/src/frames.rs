//! `StackMapTable` frames with absolute offsets.

use crate::bytes::{ByteSink, Reader, u16_len};
use crate::error::ClassFileError;

pub const NAME: &str = "StackMapTable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Pool index of a `Class` entry.
    Object(u16),
    /// Code offset of the `new` that created the value.
    Uninitialized(u16),
}

impl VerificationType {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        Ok(match reader.u8()? {
            0 => Self::Top,
            1 => Self::Integer,
            2 => Self::Float,
            3 => Self::Double,
            4 => Self::Long,
            5 => Self::Null,
            6 => Self::UninitializedThis,
            7 => Self::Object(reader.u16()?),
            8 => Self::Uninitialized(reader.u16()?),
            tag => {
                return Err(ClassFileError::constant(format!("unknown verification type tag {tag}")));
            }
        })
    }

    fn encode(self, out: &mut Vec<u8>) {
        match self {
            Self::Top => out.put_u8(0),
            Self::Integer => out.put_u8(1),
            Self::Float => out.put_u8(2),
            Self::Double => out.put_u8(3),
            Self::Long => out.put_u8(4),
            Self::Null => out.put_u8(5),
            Self::UninitializedThis => out.put_u8(6),
            Self::Object(class) => {
                out.put_u8(7);
                out.put_u16(class);
            }
            Self::Uninitialized(offset) => {
                out.put_u8(8);
                out.put_u16(offset);
            }
        }
    }
}

/// What a frame says about locals and stack, independent of its encoded delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameExtended,
    SameLocals1(VerificationType),
    SameLocals1Extended(VerificationType),
    /// Drops the last `1..=3` locals.
    Chop(u8),
    Append(Vec<VerificationType>),
    Full { locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Absolute code offset the frame applies to.
    pub offset: u32,
    pub kind: FrameKind,
}

/// # Errors
/// Returns [`ClassFileError`] for truncated data or reserved frame types.
pub fn decode(info: &[u8]) -> Result<Vec<Frame>, ClassFileError> {
    let mut reader = Reader::new(info);
    let count = reader.u16()?;
    let mut frames = Vec::with_capacity(usize::from(count));
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let frame_type = reader.u8()?;
        let (delta, kind) = match frame_type {
            0..=63 => (u16::from(frame_type), FrameKind::Same),
            64..=127 => (u16::from(frame_type - 64), FrameKind::SameLocals1(VerificationType::decode(&mut reader)?)),
            247 => {
                let delta = reader.u16()?;
                (delta, FrameKind::SameLocals1Extended(VerificationType::decode(&mut reader)?))
            }
            248..=250 => (reader.u16()?, FrameKind::Chop(251 - frame_type)),
            251 => (reader.u16()?, FrameKind::SameExtended),
            252..=254 => {
                let delta = reader.u16()?;
                let locals = (0..frame_type - 251)
                    .map(|_| VerificationType::decode(&mut reader))
                    .collect::<Result<_, _>>()?;
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = reader.u16()?;
                let locals = types(&mut reader)?;
                let stack = types(&mut reader)?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => {
                return Err(ClassFileError::constant(format!("reserved frame type {reserved}")));
            }
        };

        let offset = previous.map_or(u32::from(delta), |prev| prev + u32::from(delta) + 1);
        previous = Some(offset);
        frames.push(Frame { offset, kind });
    }

    Ok(frames)
}

fn types(reader: &mut Reader<'_>) -> Result<Vec<VerificationType>, ClassFileError> {
    let count = reader.u16()?;
    (0..count).map(|_| VerificationType::decode(reader)).collect()
}

/// Encodes frames sorted by offset. Compact kinds whose delta no longer fits are written in
/// their extended form.
///
/// # Errors
/// Returns [`ClassFileError::Internal`] when offsets are not strictly increasing.
pub fn encode(frames: &[Frame]) -> Result<Vec<u8>, ClassFileError> {
    let mut out = Vec::new();
    out.put_u16(u16_len(frames.len(), "stack map frame")?);
    let mut previous: Option<u32> = None;

    for frame in frames {
        let delta = match previous {
            None => Some(frame.offset),
            Some(prev) => frame.offset.checked_sub(prev + 1),
        }
        .and_then(|d| u16::try_from(d).ok())
        .ok_or_else(|| ClassFileError::Internal {
            message: format!("stack map frame at {} is out of order", frame.offset).into(),
            context: None,
        })?;
        previous = Some(frame.offset);

        match &frame.kind {
            FrameKind::Same if delta <= 63 => out.put_u8(delta as u8),
            FrameKind::Same | FrameKind::SameExtended => {
                out.put_u8(251);
                out.put_u16(delta);
            }
            FrameKind::SameLocals1(ty) if delta <= 63 => {
                out.put_u8(64 + delta as u8);
                ty.encode(&mut out);
            }
            FrameKind::SameLocals1(ty) | FrameKind::SameLocals1Extended(ty) => {
                out.put_u8(247);
                out.put_u16(delta);
                ty.encode(&mut out);
            }
            FrameKind::Chop(k) => {
                out.put_u8(251 - k);
                out.put_u16(delta);
            }
            FrameKind::Append(locals) => {
                out.put_u8(251 + locals.len() as u8);
                out.put_u16(delta);
                for ty in locals {
                    ty.encode(&mut out);
                }
            }
            FrameKind::Full { locals, stack } => {
                out.put_u8(255);
                out.put_u16(delta);
                for list in [locals, stack] {
                    out.put_u16(u16_len(list.len(), "frame entry")?);
                    for ty in list {
                        ty.encode(&mut out);
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Moves every frame and `Uninitialized` offset through `map`.
///
/// # Errors
/// Propagates errors from `map` and from narrowing the mapped offsets.
pub fn relocate(
    frames: &mut [Frame],
    mut map: impl FnMut(u32) -> Result<u32, ClassFileError>,
) -> Result<(), ClassFileError> {
    {
        let mut relocate_type = |ty: &mut VerificationType| -> Result<(), ClassFileError> {
            if let VerificationType::Uninitialized(offset) = ty {
                let moved = map(u32::from(*offset))?;
                *offset = u16::try_from(moved)
                    .map_err(|_| ClassFileError::CodeTooLarge { length: moved as usize, context: None })?;
            }
            Ok(())
        };

        for frame in frames.iter_mut() {
            match &mut frame.kind {
                FrameKind::SameLocals1(ty) | FrameKind::SameLocals1Extended(ty) => relocate_type(ty)?,
                FrameKind::Append(locals) => locals.iter_mut().try_for_each(&mut relocate_type)?,
                FrameKind::Full { locals, stack } => {
                    locals.iter_mut().chain(stack.iter_mut()).try_for_each(&mut relocate_type)?;
                }
                FrameKind::Same | FrameKind::SameExtended | FrameKind::Chop(_) => {}
            }
        }
    }

    for frame in frames.iter_mut() {
        frame.offset = map(frame.offset)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Frame> {
        vec![
            Frame { offset: 5, kind: FrameKind::Same },
            Frame { offset: 9, kind: FrameKind::Append(vec![VerificationType::Integer]) },
            Frame {
                offset: 20,
                kind: FrameKind::Full {
                    locals: vec![VerificationType::Object(3)],
                    stack: vec![VerificationType::Uninitialized(12)],
                },
            },
            Frame { offset: 30, kind: FrameKind::SameLocals1(VerificationType::Long) },
            Frame { offset: 31, kind: FrameKind::Chop(1) },
        ]
    }

    #[test]
    fn frames_reencode_to_the_same_table() {
        let encoded = encode(&sample()).unwrap();
        assert_eq!(decode(&encoded).unwrap(), sample());
        assert_eq!(encoded[2], 5);
    }

    #[test]
    fn large_deltas_promote_compact_kinds() {
        let mut frames = sample();
        relocate(&mut frames, |offset| Ok(if offset >= 20 { offset + 100 } else { offset })).unwrap();

        let encoded = encode(&frames).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded[2].offset, 120);
        assert_eq!(
            decoded[2].kind,
            FrameKind::Full {
                locals: vec![VerificationType::Object(3)],
                stack: vec![VerificationType::Uninitialized(12)],
            }
        );
        assert_eq!(decoded[3].offset, 130);
        assert_eq!(decoded[3].kind, FrameKind::SameLocals1(VerificationType::Long));

        // a first frame past offset 63 needs the extended form
        let first = vec![Frame { offset: 80, kind: FrameKind::Same }];
        let encoded = encode(&first).unwrap();
        assert_eq!(encoded[2], 251);
        assert_eq!(decode(&encoded).unwrap()[0].kind, FrameKind::SameExtended);
    }

    #[test]
    fn uninitialized_offsets_follow_the_map() {
        let mut frames = sample();
        relocate(&mut frames, |offset| Ok(offset + 4)).unwrap();
        let FrameKind::Full { stack, .. } = &frames[2].kind else { panic!("full frame expected") };
        assert_eq!(stack[0], VerificationType::Uninitialized(16));
        assert_eq!(frames[0].offset, 9);
    }

    #[test]
    fn reserved_frame_types_fail() {
        assert!(decode(&[0, 1, 200]).is_err());
    }
}
