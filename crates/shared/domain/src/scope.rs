use bitflags::bitflags;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Where the content of a container comes from, as tagged by the build host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Scope: u32 {
        const PROJECT = 1 << 0;
        const SUB_PROJECTS = 1 << 1;
        const EXTERNAL_LIBRARIES = 1 << 2;
        const PROJECT_LOCAL_DEPS = 1 << 3;
        const SUB_PROJECTS_LOCAL_DEPS = 1 << 4;
        const PROVIDED_ONLY = 1 << 5;
        const TESTED_CODE = 1 << 6;

        const FULL_PROJECT = Self::PROJECT.bits()
            | Self::SUB_PROJECTS.bits()
            | Self::EXTERNAL_LIBRARIES.bits();
        const ALL = Self::FULL_PROJECT.bits()
            | Self::PROJECT_LOCAL_DEPS.bits()
            | Self::SUB_PROJECTS_LOCAL_DEPS.bits()
            | Self::PROVIDED_ONLY.bits()
            | Self::TESTED_CODE.bits();
    }
}

const NAMES: &[(&str, Scope)] = &[
    ("project", Scope::PROJECT),
    ("sub_projects", Scope::SUB_PROJECTS),
    ("external_libraries", Scope::EXTERNAL_LIBRARIES),
    ("project_local_deps", Scope::PROJECT_LOCAL_DEPS),
    ("sub_projects_local_deps", Scope::SUB_PROJECTS_LOCAL_DEPS),
    ("provided_only", Scope::PROVIDED_ONLY),
    ("tested_code", Scope::TESTED_CODE),
];

impl Default for Scope {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "full_project" => Self::FULL_PROJECT,
            "all" | "*" => Self::ALL,
            other => NAMES.iter().find(|(name, _)| *name == other).map_or(Self::empty(), |e| e.1),
        }
    }
}

impl Scope {
    /// Lower-case names of the single flags set in `self`.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        NAMES.iter().filter(move |(_, flag)| self.contains(*flag)).map(|(name, _)| *name)
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let names: Vec<_> = self.names().collect();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// Accepts a list of scope names (`["project", "sub_projects"]`) or a raw bit mask.
impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScopeVisitor;

        impl<'de> Visitor<'de> for ScopeVisitor {
            type Value = Scope;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of scope names or a bit mask")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Scope, E> {
                u32::try_from(v)
                    .map(Scope::from_bits_truncate)
                    .map_err(|_| E::custom("scope mask out of range"))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Scope, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom("scope mask must be positive"))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Scope, E> {
                let scope = v.split(',').map(str::trim).fold(Scope::empty(), |acc, s| acc | Scope::from(s));
                if scope.is_empty() {
                    return Err(E::custom(format!("unknown scope '{v}'")));
                }
                Ok(scope)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Scope, A::Error> {
                let mut scope = Scope::empty();
                while let Some(name) = seq.next_element::<String>()? {
                    let flag = Scope::from(name.as_str());
                    if flag.is_empty() {
                        return Err(serde::de::Error::custom(format!("unknown scope '{name}'")));
                    }
                    scope |= flag;
                }
                Ok(scope)
            }
        }

        deserializer.deserialize_any(ScopeVisitor)
    }
}
