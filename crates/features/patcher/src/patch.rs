//! Applies a [`PatchPlan`] to the registry class.

use crate::error::{PatchError, PatchErrorExt};
use crate::plan::{PatchPlan, RegistryTarget};
use tracing::{debug, info};
use weave_classfile::edit::insert_before_returns;
use weave_classfile::opcodes::{
    ALOAD_0, DUP, GETFIELD, GETSTATIC, INVOKESPECIAL, INVOKEVIRTUAL, NEW, POP, POP2,
};
use weave_classfile::{ClassFile, ClassFileError, CodeAttribute, ConstantPool, Member};

const CONSTRUCTOR: &str = "<init>";
const NO_ARG_CONSTRUCTOR: &str = "()V";

/// The rewritten registry class and what changed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub payload: Vec<u8>,
    /// Routines that received the sequence.
    pub routines: usize,
    /// Return instructions the sequence was inserted before, across all routines.
    pub sites: usize,
    pub registrations: usize,
}

/// Rewrites `payload` so that every matching routine constructs and registers each unit
/// of `plan` before it returns.
///
/// An empty plan returns the payload unchanged without decoding it.
///
/// # Errors
/// Returns [`PatchError`] when the payload is not the configured registry, lacks the
/// field or routine, or the routine cannot be relocated.
pub fn patch_registry(payload: &[u8], plan: &PatchPlan) -> Result<Patched, PatchError> {
    if plan.is_empty() {
        debug!("Empty patch plan, registry left untouched");
        return Ok(Patched { payload: payload.to_vec(), routines: 0, sites: 0, registrations: 0 });
    }

    let target = &plan.target;
    let mut class = ClassFile::decode(payload).context("Decoding registry")?;

    let declared = class.name().context("Reading registry name")?;
    if declared != target.class.as_str() {
        return Err(PatchError::RegistryMismatch {
            message: format!("expected {}, found {declared}", target.class).into(),
            context: None,
        });
    }

    let field_is_static = find_field(&class, target)?.is_static();
    let routines = find_routines(&class, target, field_is_static)?;

    let sequence = registration_sequence(&mut class.pool, plan, field_is_static)
        .context("Building registration sequence")?;

    let mut sites = 0;
    for (method, attribute) in &routines {
        let code = CodeAttribute::decode(&class.methods[*method].attributes[*attribute].info)
            .context("Decoding routine code")?;
        let edited = insert_before_returns(&code, &class.pool, &sequence)
            .with_context(|| format!("Relocating {}", target.routine))?;
        debug!(
            routine = %target.routine,
            sites = edited.sites,
            max_stack = edited.code.max_stack,
            "Routine patched"
        );
        sites += edited.sites;
        class.methods[*method].attributes[*attribute].info =
            edited.code.encode().context("Encoding routine code")?;
    }

    let payload = class.encode().context("Encoding registry")?;
    info!(
        registry = %target.class.dotted(),
        routines = routines.len(),
        sites,
        registrations = plan.len(),
        "Registry patched"
    );

    Ok(Patched { payload, routines: routines.len(), sites, registrations: plan.len() })
}

fn find_field<'a>(class: &'a ClassFile, target: &RegistryTarget) -> Result<&'a Member, PatchError> {
    for field in &class.fields {
        if class.member_name(field)? == target.field
            && class.member_descriptor(field)? == target.field_descriptor
        {
            return Ok(field);
        }
    }
    Err(PatchError::FieldNotFound {
        message: format!("{} {}", target.field_descriptor, target.field).into(),
        context: Some(target.class.to_string().into()),
    })
}

/// Method and `Code` attribute positions of every routine to patch.
fn find_routines(
    class: &ClassFile,
    target: &RegistryTarget,
    field_is_static: bool,
) -> Result<Vec<(usize, usize)>, PatchError> {
    let mut routines = Vec::new();

    for (index, method) in class.methods.iter().enumerate() {
        if class.member_name(method)? != target.routine {
            continue;
        }
        let descriptor = class.member_descriptor(method)?;
        if target.routine_descriptor.as_deref().is_some_and(|wanted| wanted != descriptor) {
            continue;
        }

        let signature = format!("{}{descriptor}", target.routine);
        if method.is_static() && !field_is_static {
            return Err(PatchError::StaticRoutine {
                message: signature.into(),
                context: Some(format!("field {}", target.field).into()),
            });
        }
        let Some(code) = method.find_attribute(&class.pool, CodeAttribute::NAME)? else {
            return Err(PatchError::MissingCode { message: signature.into(), context: None });
        };
        routines.push((index, code));
    }

    if routines.is_empty() {
        return Err(PatchError::RoutineNotFound {
            message: format!(
                "{}{}",
                target.routine,
                target.routine_descriptor.as_deref().unwrap_or("")
            )
            .into(),
            context: Some(target.class.to_string().into()),
        });
    }
    Ok(routines)
}

/// `new T; dup; invokespecial T.<init>()V; <load field>; invokevirtual T.method; [pop]`
/// for every unit of the plan, concatenated.
fn registration_sequence(
    pool: &mut ConstantPool,
    plan: &PatchPlan,
    field_is_static: bool,
) -> Result<Vec<u8>, ClassFileError> {
    let target = &plan.target;
    let field = pool.field_ref_index(target.class.as_str(), &target.field, &target.field_descriptor)?;
    let load: &[u8] = if field_is_static { &[GETSTATIC] } else { &[ALOAD_0, GETFIELD] };
    let discard: &[u8] = match target.returned_slots {
        0 => &[],
        1 => &[POP],
        _ => &[POP2],
    };

    let mut sequence = Vec::with_capacity(plan.len() * 16);
    for unit in &plan.units {
        let class = pool.class_index(unit.as_str())?;
        let constructor = pool.method_ref_index(unit.as_str(), CONSTRUCTOR, NO_ARG_CONSTRUCTOR)?;
        let register = pool.method_ref_index(unit.as_str(), &target.method, &target.method_descriptor)?;

        sequence.push(NEW);
        sequence.extend_from_slice(&class.to_be_bytes());
        sequence.push(DUP);
        sequence.push(INVOKESPECIAL);
        sequence.extend_from_slice(&constructor.to_be_bytes());
        sequence.extend_from_slice(load);
        sequence.extend_from_slice(&field.to_be_bytes());
        sequence.push(INVOKEVIRTUAL);
        sequence.extend_from_slice(&register.to_be_bytes());
        sequence.extend_from_slice(discard);
    }
    Ok(sequence)
}
