use weave_classfile::insn::{self, Instruction};
use weave_classfile::opcodes::{
    ALOAD_0, GETFIELD, GETSTATIC, IFNONNULL, INVOKEVIRTUAL, NEW, POP, RETURN,
};
use weave_classfile::{AccessFlags, ClassBuilder, ClassFile, CodeAttribute, MethodBody};
use weave_domain::config::RegistryConfig;
use weave_domain::names::QualifiedName;
use weave_patcher::{PatchError, PatchPlan, patch_registry};

const REGISTRY: &str = "top/clarkding/router/ARouter";
const FIELD: &str = "mActRouters";
const MAP: &str = "Ljava/util/Map;";

/// `init()V` reads the field and returns from one of two places.
fn registry(field_access: AccessFlags) -> Vec<u8> {
    let is_static = field_access.contains(AccessFlags::STATIC);
    ClassBuilder::new(REGISTRY)
        .field(field_access, FIELD, MAP)
        .method(AccessFlags::PUBLIC, "init", "()V", |pool| {
            let field = pool.field_ref_index(REGISTRY, FIELD, MAP)?.to_be_bytes();
            let mut code = if is_static {
                vec![GETSTATIC, field[0], field[1], 0x00]
            } else {
                vec![ALOAD_0, GETFIELD, field[0], field[1]]
            };
            // 4: ifnonnull -> 8; 7: return; 8: return
            code.extend_from_slice(&[IFNONNULL, 0, 4, RETURN, RETURN]);
            Ok(MethodBody::new(1, 1, code))
        })
        .method(AccessFlags::PUBLIC, "size", "()I", |_| Ok(MethodBody::new(1, 1, [0x03, 0xac])))
        .build()
        .unwrap()
}

fn plan(units: &[&str]) -> PatchPlan {
    plan_with(&RegistryConfig::default(), units)
}

fn plan_with(config: &RegistryConfig, units: &[&str]) -> PatchPlan {
    let units = units.iter().map(|u| QualifiedName::parse(u).unwrap()).collect();
    PatchPlan::from_config(config, units).unwrap()
}

fn routine_code(class: &ClassFile, name: &str) -> CodeAttribute {
    let method = class.methods.iter().find(|m| class.member_name(m).unwrap() == name).unwrap();
    let at = method.find_attribute(&class.pool, CodeAttribute::NAME).unwrap().unwrap();
    CodeAttribute::decode(&method.attributes[at].info).unwrap()
}

fn operand(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[1], bytes[2]])
}

/// Class constructed by each `new`, in code order.
fn constructed(class: &ClassFile, code: &[u8]) -> Vec<String> {
    insn::decode(code)
        .unwrap()
        .iter()
        .filter_map(|located| match &located.insn {
            Instruction::Plain { bytes } if bytes[0] == NEW => {
                Some(class.pool.class_name(operand(bytes)).unwrap().to_owned())
            },
            _ => None,
        })
        .collect()
}

#[test]
fn every_return_registers_every_unit_in_order() {
    let patched = patch_registry(&registry(AccessFlags::PRIVATE), &plan(&["a/X", "b/Z"])).unwrap();
    assert_eq!((patched.routines, patched.sites, patched.registrations), (1, 2, 2));

    let class = ClassFile::decode(&patched.payload).unwrap();
    let code = routine_code(&class, "init");
    assert_eq!(constructed(&class, &code.code), ["a/X", "b/Z", "a/X", "b/Z"]);
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 1);

    let insns = insn::decode(&code.code).unwrap();
    let branch = insns.iter().find(|l| l.insn.opcode() == IFNONNULL).unwrap();
    let Instruction::Branch { target, .. } = branch.insn else { panic!("not a branch") };
    let first_block_len = (code.code.len() - 2) / 2 - 3;
    assert_eq!(target as usize, 7 + first_block_len + 1);
    assert_eq!(insns.iter().find(|l| l.offset == target).unwrap().insn.opcode(), NEW);

    let calls: Vec<_> = insns
        .iter()
        .filter_map(|l| match &l.insn {
            Instruction::Plain { bytes } if bytes[0] == INVOKEVIRTUAL => {
                Some(class.pool.member_ref(operand(bytes)).unwrap())
            },
            _ => None,
        })
        .map(|m| (m.class.to_owned(), m.name.to_owned(), m.descriptor.to_owned()))
        .collect();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[1], ("b/Z".to_owned(), "putActivity".to_owned(), "(Ljava/util/Map;)V".to_owned()));
}

#[test]
fn untouched_parts_survive() {
    let original = ClassFile::decode(&registry(AccessFlags::PRIVATE)).unwrap();
    let patched = patch_registry(&registry(AccessFlags::PRIVATE), &plan(&["a/X"])).unwrap();
    let class = ClassFile::decode(&patched.payload).unwrap();

    assert_eq!(class.fields, original.fields);
    assert_eq!(class.methods[1], original.methods[1]);
    assert_eq!(routine_code(&class, "size"), routine_code(&original, "size"));
    assert!(class.pool.len() > original.pool.len());
}

#[test]
fn empty_plan_is_byte_identical() {
    let payload = registry(AccessFlags::PRIVATE);
    let patched = patch_registry(&payload, &plan(&[])).unwrap();
    assert_eq!(patched.payload, payload);
    assert_eq!(patched.sites, 0);
}

#[test]
fn patching_is_deterministic() {
    let payload = registry(AccessFlags::PRIVATE);
    let first = patch_registry(&payload, &plan(&["a/X", "b/Z"])).unwrap();
    let second = patch_registry(&payload, &plan(&["a/X", "b/Z"])).unwrap();
    assert_eq!(first, second);
}

#[test]
fn static_fields_are_read_with_getstatic() {
    let payload = registry(AccessFlags::PRIVATE | AccessFlags::STATIC);
    let patched = patch_registry(&payload, &plan(&["a/X"])).unwrap();
    let class = ClassFile::decode(&patched.payload).unwrap();
    let code = routine_code(&class, "init");

    let gets = insn::decode(&code.code).unwrap().iter().filter(|l| l.insn.opcode() == GETSTATIC).count();
    // the original read plus one per return site
    assert_eq!(gets, 3);
}

#[test]
fn returned_values_are_discarded() {
    let mut config = RegistryConfig::default();
    config.method_descriptor = "(Ljava/util/Map;)Ljava/lang/Object;".to_owned();
    let patched = patch_registry(&registry(AccessFlags::PRIVATE), &plan_with(&config, &["a/X"])).unwrap();
    let class = ClassFile::decode(&patched.payload).unwrap();
    let code = routine_code(&class, "init");

    let opcodes: Vec<u8> = insn::decode(&code.code).unwrap().iter().map(|l| l.insn.opcode()).collect();
    let call = opcodes.iter().position(|op| *op == INVOKEVIRTUAL).unwrap();
    assert_eq!(opcodes[call + 1], POP);
}

#[test]
fn wrong_class_is_a_mismatch() {
    let payload = ClassBuilder::new("other/Registry").build().unwrap();
    let err = patch_registry(&payload, &plan(&["a/X"])).unwrap_err();
    assert!(matches!(err, PatchError::RegistryMismatch { .. }));
}

#[test]
fn missing_members_are_reported() {
    let no_field = ClassBuilder::new(REGISTRY)
        .method(AccessFlags::PUBLIC, "init", "()V", |_| Ok(MethodBody::new(0, 1, [RETURN])))
        .build()
        .unwrap();
    assert!(matches!(
        patch_registry(&no_field, &plan(&["a/X"])),
        Err(PatchError::FieldNotFound { .. })
    ));

    let no_routine = ClassBuilder::new(REGISTRY).field(AccessFlags::PRIVATE, FIELD, MAP).build().unwrap();
    assert!(matches!(
        patch_registry(&no_routine, &plan(&["a/X"])),
        Err(PatchError::RoutineNotFound { .. })
    ));

    let no_code = ClassBuilder::new(REGISTRY)
        .field(AccessFlags::PRIVATE, FIELD, MAP)
        .abstract_method(AccessFlags::PUBLIC, "init", "()V")
        .build()
        .unwrap();
    assert!(matches!(patch_registry(&no_code, &plan(&["a/X"])), Err(PatchError::MissingCode { .. })));
}

#[test]
fn static_routine_cannot_reach_instance_field() {
    let payload = ClassBuilder::new(REGISTRY)
        .field(AccessFlags::PRIVATE, FIELD, MAP)
        .method(AccessFlags::PUBLIC | AccessFlags::STATIC, "init", "()V", |_| {
            Ok(MethodBody::new(0, 0, [RETURN]))
        })
        .build()
        .unwrap();
    assert!(matches!(patch_registry(&payload, &plan(&["a/X"])), Err(PatchError::StaticRoutine { .. })));
}

#[test]
fn routine_descriptor_narrows_overloads() {
    let payload = ClassBuilder::new(REGISTRY)
        .field(AccessFlags::PRIVATE, FIELD, MAP)
        .method(AccessFlags::PUBLIC, "init", "()V", |_| Ok(MethodBody::new(0, 1, [RETURN])))
        .method(AccessFlags::PUBLIC, "init", "(I)V", |_| Ok(MethodBody::new(0, 2, [RETURN])))
        .build()
        .unwrap();

    let everything = patch_registry(&payload, &plan(&["a/X"])).unwrap();
    assert_eq!(everything.routines, 2);

    let mut config = RegistryConfig::default();
    config.routine_descriptor = Some("(I)V".to_owned());
    let narrowed = patch_registry(&payload, &plan_with(&config, &["a/X"])).unwrap();
    assert_eq!((narrowed.routines, narrowed.sites), (1, 1));
}
