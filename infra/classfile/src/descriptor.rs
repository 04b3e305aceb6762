//! Field and method descriptors, as far as operand-stack accounting needs them.

use crate::error::ClassFileError;

/// Stack slots taken by a value of the given field descriptor.
///
/// # Errors
/// Returns [`ClassFileError::InvalidConstant`] for malformed descriptors.
pub fn field_slots(descriptor: &str) -> Result<u16, ClassFileError> {
    let (slots, rest) = field_type(descriptor)?;
    if !rest.is_empty() {
        return Err(malformed(descriptor));
    }
    Ok(slots)
}

/// A parsed method descriptor such as `(ILjava/lang/String;)J`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Stack slots of each parameter, in order.
    pub params: Vec<u16>,
    /// Stack slots of the return value; `0` for `V`.
    pub returns: u16,
}

impl MethodDescriptor {
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] for malformed descriptors.
    pub fn parse(descriptor: &str) -> Result<Self, ClassFileError> {
        let mut rest = descriptor.strip_prefix('(').ok_or_else(|| malformed(descriptor))?;
        let mut params = Vec::new();

        while !rest.starts_with(')') {
            if rest.is_empty() {
                return Err(malformed(descriptor));
            }
            let (slots, tail) = field_type(rest)?;
            params.push(slots);
            rest = tail;
        }

        let returns = match &rest[1..] {
            "V" => 0,
            ret => field_slots(ret).map_err(|_| malformed(descriptor))?,
        };
        Ok(Self { params, returns })
    }

    #[must_use]
    pub fn param_slots(&self) -> u16 {
        self.params.iter().sum()
    }
}

/// Parses one field type off the front of `input`, returning its slot size and the rest.
fn field_type(input: &str) -> Result<(u16, &str), ClassFileError> {
    let bytes = input.as_bytes();
    let mut dims = 0;
    while bytes.get(dims) == Some(&b'[') {
        dims += 1;
    }

    let (slots, len) = match bytes.get(dims) {
        Some(b'B' | b'C' | b'F' | b'I' | b'S' | b'Z') => (1, 1),
        Some(b'J' | b'D') => (2, 1),
        Some(b'L') => {
            let end = input[dims..].find(';').ok_or_else(|| malformed(input))?;
            if end == 1 {
                return Err(malformed(input));
            }
            (1, end + 1)
        }
        _ => return Err(malformed(input)),
    };

    let slots = if dims > 0 { 1 } else { slots };
    Ok((slots, &input[dims + len..]))
}

fn malformed(descriptor: &str) -> ClassFileError {
    ClassFileError::constant(format!("malformed descriptor '{descriptor}'"))
}
