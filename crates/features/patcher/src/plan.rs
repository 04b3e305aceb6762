use crate::error::PatchError;
use weave_classfile::descriptor::MethodDescriptor;
use weave_domain::config::RegistryConfig;
use weave_domain::names::QualifiedName;

/// How registrations reach the registry class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    pub class: QualifiedName,
    pub routine: String,
    /// Every overload named `routine` is patched when unset.
    pub routine_descriptor: Option<String>,
    pub field: String,
    pub field_descriptor: String,
    /// Instance method of each discovered unit that receives the field value.
    pub method: String,
    pub method_descriptor: String,
    /// Stack slots the registration method leaves behind, popped after each call.
    pub(crate) returned_slots: u16,
}

impl RegistryTarget {
    /// # Errors
    /// Returns [`PatchError::RegistryMismatch`] for a malformed class name and
    /// [`PatchError::UnsupportedSignature`] unless the registration method takes exactly
    /// one parameter.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, PatchError> {
        let class = QualifiedName::parse(&config.class_name).map_err(|err| PatchError::RegistryMismatch {
            message: err.to_string().into(),
            context: Some("registry.class".into()),
        })?;

        let method = format!("{}{}", config.method, config.method_descriptor);
        let signature = MethodDescriptor::parse(&config.method_descriptor).map_err(|err| {
            PatchError::UnsupportedSignature { message: err.to_string().into(), context: Some(method.clone().into()) }
        })?;
        if signature.params.len() != 1 {
            return Err(PatchError::UnsupportedSignature {
                message: format!("takes {} parameters, expected one", signature.params.len()).into(),
                context: Some(method.into()),
            });
        }

        Ok(Self {
            class,
            routine: config.routine.clone(),
            routine_descriptor: config.routine_descriptor.clone(),
            field: config.field.clone(),
            field_descriptor: config.field_descriptor.clone(),
            method: config.method.clone(),
            method_descriptor: config.method_descriptor.clone(),
            returned_slots: signature.returns,
        })
    }
}

/// One construct-and-register sequence per discovered unit, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    pub target: RegistryTarget,
    pub units: Vec<QualifiedName>,
}

impl PatchPlan {
    #[must_use]
    pub const fn new(target: RegistryTarget, units: Vec<QualifiedName>) -> Self {
        Self { target, units }
    }

    /// # Errors
    /// See [`RegistryTarget::from_config`].
    pub fn from_config(config: &RegistryConfig, units: Vec<QualifiedName>) -> Result<Self, PatchError> {
        Ok(Self::new(RegistryTarget::from_config(config)?, units))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_registers_through_put_activity() {
        let target = RegistryTarget::from_config(&RegistryConfig::default()).unwrap();
        assert_eq!(target.class.as_str(), "top/clarkding/router/ARouter");
        assert_eq!(target.method, "putActivity");
        assert_eq!(target.returned_slots, 0);
    }

    #[test]
    fn registration_method_takes_exactly_one_argument() {
        let mut config = RegistryConfig::default();
        config.method_descriptor = "(Ljava/util/Map;I)V".to_owned();
        assert!(matches!(
            RegistryTarget::from_config(&config),
            Err(PatchError::UnsupportedSignature { .. })
        ));

        config.method_descriptor = "not a descriptor".to_owned();
        assert!(matches!(
            RegistryTarget::from_config(&config),
            Err(PatchError::UnsupportedSignature { .. })
        ));

        config.method_descriptor = "(Ljava/util/Map;)J".to_owned();
        assert_eq!(RegistryTarget::from_config(&config).unwrap().returned_slots, 2);
    }
}
