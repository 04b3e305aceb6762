//! A small assembler for class files, used to produce fixtures.

use crate::class::{AccessFlags, Attribute, ClassFile, Member};
use crate::code::{CodeAttribute, ExceptionEntry};
use crate::error::ClassFileError;
use crate::pool::ConstantPool;

const JAVA_8: u16 = 52;
const OBJECT: &str = "java/lang/Object";

/// Body of a method under construction.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested `Code` attributes by name.
    pub attributes: Vec<(String, Vec<u8>)>,
}

impl MethodBody {
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, code: impl Into<Vec<u8>>) -> Self {
        Self { max_stack, max_locals, code: code.into(), ..Self::default() }
    }

    #[must_use]
    pub fn handler(mut self, entry: ExceptionEntry) -> Self {
        self.exception_table.push(entry);
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, info: impl Into<Vec<u8>>) -> Self {
        self.attributes.push((name.into(), info.into()));
        self
    }
}

/// Builds a class file member by member.
///
/// The first failure is remembered and reported by [`ClassBuilder::build`].
#[derive(Debug)]
pub struct ClassBuilder {
    class: ClassFile,
    error: Option<ClassFileError>,
}

impl ClassBuilder {
    /// A public class named `name` extending `java/lang/Object`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let class = ClassFile {
            minor_version: 0,
            major_version: JAVA_8,
            pool: ConstantPool::new(),
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        Self { class, error: None }.apply(|class| {
            class.this_class = class.pool.class_index(name)?;
            class.super_class = class.pool.class_index(OBJECT)?;
            Ok(())
        })
    }

    fn apply(mut self, step: impl FnOnce(&mut ClassFile) -> Result<(), ClassFileError>) -> Self {
        if self.error.is_none() {
            if let Err(err) = step(&mut self.class) {
                self.error = Some(err);
            }
        }
        self
    }

    #[must_use]
    pub fn access(mut self, access: AccessFlags) -> Self {
        self.class.access = access;
        self
    }

    #[must_use]
    pub fn super_class(self, name: &str) -> Self {
        self.apply(|class| {
            class.super_class = class.pool.class_index(name)?;
            Ok(())
        })
    }

    #[must_use]
    pub fn interface(self, name: &str) -> Self {
        self.apply(|class| {
            let index = class.pool.class_index(name)?;
            class.interfaces.push(index);
            Ok(())
        })
    }

    #[must_use]
    pub fn field(self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        self.apply(|class| {
            let member = Member {
                access,
                name: class.pool.utf8_index(name)?,
                descriptor: class.pool.utf8_index(descriptor)?,
                attributes: Vec::new(),
            };
            class.fields.push(member);
            Ok(())
        })
    }

    /// Adds a method without a `Code` attribute.
    #[must_use]
    pub fn abstract_method(self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        self.apply(|class| {
            let member = Member {
                access: access | AccessFlags::ABSTRACT,
                name: class.pool.utf8_index(name)?,
                descriptor: class.pool.utf8_index(descriptor)?,
                attributes: Vec::new(),
            };
            class.methods.push(member);
            Ok(())
        })
    }

    /// Adds a method whose body is produced by `body`, which may add pool entries.
    #[must_use]
    pub fn method(
        self,
        access: AccessFlags,
        name: &str,
        descriptor: &str,
        body: impl FnOnce(&mut ConstantPool) -> Result<MethodBody, ClassFileError>,
    ) -> Self {
        self.apply(|class| {
            let name = class.pool.utf8_index(name)?;
            let descriptor = class.pool.utf8_index(descriptor)?;
            let body = body(&mut class.pool)?;

            let mut nested = Vec::with_capacity(body.attributes.len());
            for (name, info) in body.attributes {
                nested.push(Attribute { name: class.pool.utf8_index(&name)?, info });
            }
            let code = CodeAttribute {
                max_stack: body.max_stack,
                max_locals: body.max_locals,
                code: body.code,
                exception_table: body.exception_table,
                attributes: nested,
            };
            let code = Attribute {
                name: class.pool.utf8_index(CodeAttribute::NAME)?,
                info: code.encode()?,
            };

            class.methods.push(Member { access, name, descriptor, attributes: vec![code] });
            Ok(())
        })
    }

    /// Adds a class-level attribute.
    #[must_use]
    pub fn attribute(self, name: &str, info: impl Into<Vec<u8>>) -> Self {
        let info = info.into();
        self.apply(|class| {
            let name = class.pool.utf8_index(name)?;
            class.attributes.push(Attribute { name, info });
            Ok(())
        })
    }

    /// # Errors
    /// Returns the first error any builder step ran into.
    pub fn build(self) -> Result<Vec<u8>, ClassFileError> {
        match self.error {
            Some(err) => Err(err),
            None => self.class.encode(),
        }
    }
}
