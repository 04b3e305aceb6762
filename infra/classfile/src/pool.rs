//! The constant pool.
//!
//! Entries read from a class are kept as their original bytes so that
//! re-encoding an untouched pool is byte-identical. Lookups append new entries
//! after the original ones only when no equal entry exists yet.

use crate::bytes::{ByteSink, Reader};
use crate::error::ClassFileError;
use crate::mutf8;

mod tag {
    pub(super) const UTF8: u8 = 1;
    pub(super) const INTEGER: u8 = 3;
    pub(super) const FLOAT: u8 = 4;
    pub(super) const LONG: u8 = 5;
    pub(super) const DOUBLE: u8 = 6;
    pub(super) const CLASS: u8 = 7;
    pub(super) const STRING: u8 = 8;
    pub(super) const FIELD_REF: u8 = 9;
    pub(super) const METHOD_REF: u8 = 10;
    pub(super) const INTERFACE_METHOD_REF: u8 = 11;
    pub(super) const NAME_AND_TYPE: u8 = 12;
    pub(super) const METHOD_HANDLE: u8 = 15;
    pub(super) const METHOD_TYPE: u8 = 16;
    pub(super) const DYNAMIC: u8 = 17;
    pub(super) const INVOKE_DYNAMIC: u8 = 18;
    pub(super) const MODULE: u8 = 19;
    pub(super) const PACKAGE: u8 = 20;
}

/// One constant pool entry. Indices refer to other entries of the same pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    /// Raw IEEE-754 bits.
    Float(u32),
    Long(i64),
    /// Raw IEEE-754 bits.
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

impl Constant {
    /// Long and double entries occupy two pool slots.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let at = reader.position();
        let constant = match reader.u8()? {
            tag::UTF8 => {
                let len = reader.u16()?;
                Self::Utf8(mutf8::decode(reader.bytes(usize::from(len))?)?)
            }
            tag::INTEGER => Self::Integer(reader.i32()?),
            tag::FLOAT => Self::Float(reader.u32()?),
            tag::LONG => Self::Long((u64::from(reader.u32()?) << 32 | u64::from(reader.u32()?)) as i64),
            tag::DOUBLE => Self::Double(u64::from(reader.u32()?) << 32 | u64::from(reader.u32()?)),
            tag::CLASS => Self::Class { name: reader.u16()? },
            tag::STRING => Self::String { value: reader.u16()? },
            tag::FIELD_REF => Self::FieldRef { class: reader.u16()?, name_and_type: reader.u16()? },
            tag::METHOD_REF => Self::MethodRef { class: reader.u16()?, name_and_type: reader.u16()? },
            tag::INTERFACE_METHOD_REF => {
                Self::InterfaceMethodRef { class: reader.u16()?, name_and_type: reader.u16()? }
            }
            tag::NAME_AND_TYPE => Self::NameAndType { name: reader.u16()?, descriptor: reader.u16()? },
            tag::METHOD_HANDLE => Self::MethodHandle { kind: reader.u8()?, reference: reader.u16()? },
            tag::METHOD_TYPE => Self::MethodType { descriptor: reader.u16()? },
            tag::DYNAMIC => Self::Dynamic { bootstrap: reader.u16()?, name_and_type: reader.u16()? },
            tag::INVOKE_DYNAMIC => {
                Self::InvokeDynamic { bootstrap: reader.u16()?, name_and_type: reader.u16()? }
            }
            tag::MODULE => Self::Module { name: reader.u16()? },
            tag::PACKAGE => Self::Package { name: reader.u16()? },
            other => {
                return Err(ClassFileError::constant(format!("unknown tag {other} at byte {at}")));
            }
        };
        Ok(constant)
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), ClassFileError> {
        match self {
            Self::Utf8(text) => {
                let bytes = mutf8::encode(text);
                let len = u16::try_from(bytes.len())
                    .map_err(|_| ClassFileError::constant("utf8 constant longer than 65535 bytes"))?;
                out.put_u8(tag::UTF8);
                out.put_u16(len);
                out.extend_from_slice(&bytes);
            }
            Self::Integer(v) => {
                out.put_u8(tag::INTEGER);
                out.put_i32(*v);
            }
            Self::Float(bits) => {
                out.put_u8(tag::FLOAT);
                out.put_u32(*bits);
            }
            Self::Long(v) => {
                out.put_u8(tag::LONG);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Double(bits) => {
                out.put_u8(tag::DOUBLE);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            Self::Class { name } => pair(out, tag::CLASS, &[*name]),
            Self::String { value } => pair(out, tag::STRING, &[*value]),
            Self::FieldRef { class, name_and_type } => {
                pair(out, tag::FIELD_REF, &[*class, *name_and_type]);
            }
            Self::MethodRef { class, name_and_type } => {
                pair(out, tag::METHOD_REF, &[*class, *name_and_type]);
            }
            Self::InterfaceMethodRef { class, name_and_type } => {
                pair(out, tag::INTERFACE_METHOD_REF, &[*class, *name_and_type]);
            }
            Self::NameAndType { name, descriptor } => {
                pair(out, tag::NAME_AND_TYPE, &[*name, *descriptor]);
            }
            Self::MethodHandle { kind, reference } => {
                out.put_u8(tag::METHOD_HANDLE);
                out.put_u8(*kind);
                out.put_u16(*reference);
            }
            Self::MethodType { descriptor } => pair(out, tag::METHOD_TYPE, &[*descriptor]),
            Self::Dynamic { bootstrap, name_and_type } => {
                pair(out, tag::DYNAMIC, &[*bootstrap, *name_and_type]);
            }
            Self::InvokeDynamic { bootstrap, name_and_type } => {
                pair(out, tag::INVOKE_DYNAMIC, &[*bootstrap, *name_and_type]);
            }
            Self::Module { name } => pair(out, tag::MODULE, &[*name]),
            Self::Package { name } => pair(out, tag::PACKAGE, &[*name]),
        }
        Ok(())
    }
}

fn pair(out: &mut Vec<u8>, tag: u8, indices: &[u16]) {
    out.put_u8(tag);
    for index in indices {
        out.put_u16(*index);
    }
}

/// A field or method reference resolved to its strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    /// Slot 0 and the upper half of wide entries are `None`.
    entries: Vec<Option<Constant>>,
    /// Encoded form of the entries read from the class, without the count.
    original: Vec<u8>,
    original_slots: usize,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// An empty pool, for building classes from scratch.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: vec![None], original: Vec::new(), original_slots: 1 }
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let count = usize::from(reader.u16()?);
        if count == 0 {
            return Err(ClassFileError::constant("pool count must be at least 1"));
        }

        let start = reader.position();
        let mut entries = Vec::with_capacity(count);
        entries.push(None);

        while entries.len() < count {
            let constant = Constant::decode(reader)?;
            let wide = constant.is_wide();
            entries.push(Some(constant));
            if wide {
                if entries.len() >= count {
                    return Err(ClassFileError::constant("wide constant overruns the pool"));
                }
                entries.push(None);
            }
        }

        Ok(Self { entries, original: reader.since(start).to_vec(), original_slots: count })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), ClassFileError> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| ClassFileError::PoolOverflow { context: None })?;
        out.put_u16(count);
        out.extend_from_slice(&self.original);
        for constant in self.entries[self.original_slots..].iter().flatten() {
            constant.encode(out)?;
        }
        Ok(())
    }

    /// Number of slots, including the unused slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Slots appended since the pool was read.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.entries.len() - self.original_slots
    }

    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] for index 0, indices past the end and
    /// the upper half of long/double entries.
    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        self.entries
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or_else(|| ClassFileError::constant(format!("no constant at index {index}")))
    }

    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] unless `index` holds a `Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(mismatch(index, "Utf8", other)),
        }
    }

    /// Internal name of the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] unless `index` holds a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            other => Err(mismatch(index, "Class", other)),
        }
    }

    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] unless `index` holds a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(mismatch(index, "NameAndType", other)),
        }
    }

    /// Resolves a field, method or interface method reference.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] for any other entry.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFileError> {
        match self.get(index)? {
            Constant::FieldRef { class, name_and_type }
            | Constant::MethodRef { class, name_and_type }
            | Constant::InterfaceMethodRef { class, name_and_type } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok(MemberRef { class: self.class_name(*class)?, name, descriptor })
            }
            other => Err(mismatch(index, "member reference", other)),
        }
    }

    /// Descriptor of the call site behind an `invokedynamic` entry.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] for any other entry.
    pub fn dynamic_descriptor(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::InvokeDynamic { name_and_type, .. } | Constant::Dynamic { name_and_type, .. } => {
                self.name_and_type(*name_and_type).map(|(_, descriptor)| descriptor)
            }
            other => Err(mismatch(index, "InvokeDynamic", other)),
        }
    }

    /// Returns the index of an entry equal to `constant`, appending it when missing.
    ///
    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn find_or_push(&mut self, constant: Constant) -> Result<u16, ClassFileError> {
        if let Some(found) = self.entries.iter().position(|e| e.as_ref() == Some(&constant)) {
            return u16::try_from(found).map_err(|_| ClassFileError::PoolOverflow { context: None });
        }

        let slots = if constant.is_wide() { 2 } else { 1 };
        let index = self.entries.len();
        if index + slots > usize::from(u16::MAX) {
            return Err(ClassFileError::PoolOverflow { context: None });
        }

        self.entries.push(Some(constant));
        if slots == 2 {
            self.entries.push(None);
        }
        u16::try_from(index).map_err(|_| ClassFileError::PoolOverflow { context: None })
    }

    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn utf8_index(&mut self, text: &str) -> Result<u16, ClassFileError> {
        self.find_or_push(Constant::Utf8(text.to_owned()))
    }

    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn class_index(&mut self, name: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8_index(name)?;
        self.find_or_push(Constant::Class { name })
    }

    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn name_and_type_index(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8_index(name)?;
        let descriptor = self.utf8_index(descriptor)?;
        self.find_or_push(Constant::NameAndType { name, descriptor })
    }

    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn field_ref_index(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFileError> {
        let class = self.class_index(class)?;
        let name_and_type = self.name_and_type_index(name, descriptor)?;
        self.find_or_push(Constant::FieldRef { class, name_and_type })
    }

    /// # Errors
    /// Returns [`ClassFileError::PoolOverflow`] when no slot is left.
    pub fn method_ref_index(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFileError> {
        let class = self.class_index(class)?;
        let name_and_type = self.name_and_type_index(name, descriptor)?;
        self.find_or_push(Constant::MethodRef { class, name_and_type })
    }
}

fn mismatch(index: u16, expected: &str, found: &Constant) -> ClassFileError {
    ClassFileError::constant(format!("expected {expected} at index {index}, found {found:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(pool: &ConstantPool) -> ConstantPool {
        let mut out = Vec::new();
        pool.encode(&mut out).unwrap();
        ConstantPool::decode(&mut Reader::new(&out)).unwrap()
    }

    #[test]
    fn lookups_reuse_existing_entries() {
        let mut pool = ConstantPool::new();
        let first = pool.method_ref_index("a/B", "<init>", "()V").unwrap();
        let slots = pool.len();
        let second = pool.method_ref_index("a/B", "<init>", "()V").unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.len(), slots);
        let member = pool.member_ref(first).unwrap();
        assert_eq!(member, MemberRef { class: "a/B", name: "<init>", descriptor: "()V" });
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.find_or_push(Constant::Long(-7)).unwrap();
        let next = pool.utf8_index("x").unwrap();
        assert_eq!(next, long + 2);
        assert!(pool.get(long + 1).is_err());

        let again = decoded(&pool);
        assert_eq!(again.get(long).unwrap(), &Constant::Long(-7));
        assert_eq!(again.utf8(next).unwrap(), "x");
    }

    #[test]
    fn decoded_pool_reencodes_verbatim_and_appends() {
        let mut pool = ConstantPool::new();
        pool.class_index("a/B").unwrap();
        pool.find_or_push(Constant::Double(1.5f64.to_bits())).unwrap();
        let mut original = Vec::new();
        pool.encode(&mut original).unwrap();

        let mut reread = ConstantPool::decode(&mut Reader::new(&original)).unwrap();
        let mut out = Vec::new();
        reread.encode(&mut out).unwrap();
        assert_eq!(out, original);

        let added = reread.utf8_index("new").unwrap();
        assert_eq!(usize::from(added), pool.len());
        assert_eq!(reread.appended(), 1);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.utf8_index("a").unwrap();
        assert!(pool.class_name(utf8).is_err());
        assert!(pool.get(0).is_err());
    }
}
