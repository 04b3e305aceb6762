use crate::bytes::{ByteSink, Reader, u16_len, u32_len};
use crate::error::ClassFileError;
use crate::pool::ConstantPool;
use bitflags::bitflags;

/// `0xCAFEBABE`.
pub const MAGIC: u32 = 0xCAFE_BABE;

bitflags! {
    /// Access and property flags shared by classes, fields and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

/// An attribute kept as raw bytes; only `Code` is ever looked into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Pool index of the attribute name.
    pub name: u16,
    pub info: Vec<u8>,
}

impl Attribute {
    pub(crate) fn decode_all(reader: &mut Reader<'_>) -> Result<Vec<Self>, ClassFileError> {
        let count = reader.u16()?;
        (0..count)
            .map(|_| {
                let name = reader.u16()?;
                let len = reader.u32()? as usize;
                Ok(Self { name, info: reader.bytes(len)?.to_vec() })
            })
            .collect()
    }

    pub(crate) fn encode_all(attributes: &[Self], out: &mut Vec<u8>) -> Result<(), ClassFileError> {
        out.put_u16(u16_len(attributes.len(), "attribute")?);
        for attribute in attributes {
            out.put_u16(attribute.name);
            out.put_u32(u32_len(attribute.info.len(), "attribute")?);
            out.extend_from_slice(&attribute.info);
        }
        Ok(())
    }
}

/// A field or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access: AccessFlags,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

impl Member {
    fn decode_all(reader: &mut Reader<'_>) -> Result<Vec<Self>, ClassFileError> {
        let count = reader.u16()?;
        (0..count)
            .map(|_| {
                Ok(Self {
                    access: AccessFlags::from_bits_retain(reader.u16()?),
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                    attributes: Attribute::decode_all(reader)?,
                })
            })
            .collect()
    }

    fn encode_all(members: &[Self], out: &mut Vec<u8>) -> Result<(), ClassFileError> {
        out.put_u16(u16_len(members.len(), "member")?);
        for member in members {
            out.put_u16(member.access.bits());
            out.put_u16(member.name);
            out.put_u16(member.descriptor);
            Attribute::encode_all(&member.attributes, out)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Position of the first attribute called `name`.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] if an attribute name index is not a `Utf8` entry.
    pub fn find_attribute(&self, pool: &ConstantPool, name: &str) -> Result<Option<usize>, ClassFileError> {
        for (at, attribute) in self.attributes.iter().enumerate() {
            if pool.utf8(attribute.name)? == name {
                return Ok(Some(at));
            }
        }
        Ok(None)
    }
}

/// A fully decoded class file. Everything but the pool stays in raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: u16,
    /// `0` only for `java/lang/Object`.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// # Errors
    /// Returns [`ClassFileError`] when `bytes` is not a well-formed class file.
    pub fn decode(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = Reader::new(bytes);
        let head = Head::decode(&mut reader)?;
        let fields = Member::decode_all(&mut reader)?;
        let methods = Member::decode_all(&mut reader)?;
        let attributes = Attribute::decode_all(&mut reader)?;

        if !reader.is_empty() {
            return Err(ClassFileError::Internal {
                message: format!("{} trailing bytes after class data", bytes.len() - reader.position())
                    .into(),
                context: None,
            });
        }

        Ok(Self {
            minor_version: head.minor_version,
            major_version: head.major_version,
            pool: head.pool,
            access: head.access,
            this_class: head.this_class,
            super_class: head.super_class,
            interfaces: head.interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// # Errors
    /// Returns [`ClassFileError`] when a table outgrows its length field.
    pub fn encode(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut out = Vec::new();
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);
        self.pool.encode(&mut out)?;
        out.put_u16(self.access.bits());
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);
        out.put_u16(u16_len(self.interfaces.len(), "interface")?);
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }
        Member::encode_all(&self.fields, &mut out)?;
        Member::encode_all(&self.methods, &mut out)?;
        Attribute::encode_all(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Internal name of this class.
    ///
    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] if `this_class` is not a `Class` entry.
    pub fn name(&self) -> Result<&str, ClassFileError> {
        self.pool.class_name(self.this_class)
    }

    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] if the name indices are broken.
    pub fn member_name(&self, member: &Member) -> Result<&str, ClassFileError> {
        self.pool.utf8(member.name)
    }

    /// # Errors
    /// Returns [`ClassFileError::InvalidConstant`] if the descriptor index is broken.
    pub fn member_descriptor(&self, member: &Member) -> Result<&str, ClassFileError> {
        self.pool.utf8(member.descriptor)
    }
}

/// The part of a class file that identifies it: names and direct supertypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub access: AccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    /// Directly implemented interfaces, in declaration order.
    pub interfaces: Vec<String>,
}

impl ClassHeader {
    /// Decodes only up to the interface table; members and attributes are not read.
    ///
    /// # Errors
    /// Returns [`ClassFileError`] when the header or constant pool is malformed.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let head = Head::decode(&mut Reader::new(bytes))?;
        let pool = &head.pool;

        let super_name = match head.super_class {
            0 => None,
            index => Some(pool.class_name(index)?.to_owned()),
        };
        let interfaces = head
            .interfaces
            .iter()
            .map(|index| pool.class_name(*index).map(str::to_owned))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            minor_version: head.minor_version,
            major_version: head.major_version,
            access: head.access,
            name: pool.class_name(head.this_class)?.to_owned(),
            super_name,
            interfaces,
        })
    }

    /// Whether `interface` is among the directly implemented interfaces.
    #[must_use]
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|name| name == interface)
    }
}

struct Head {
    minor_version: u16,
    major_version: u16,
    pool: ConstantPool,
    access: AccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
}

impl Head {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic { found: magic, context: None });
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let pool = ConstantPool::decode(reader)?;
        let access = AccessFlags::from_bits_retain(reader.u16()?);
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;
        let count = reader.u16()?;
        let interfaces = (0..count).map(|_| reader.u16()).collect::<Result<_, _>>()?;

        Ok(Self { minor_version, major_version, pool, access, this_class, super_class, interfaces })
    }
}
