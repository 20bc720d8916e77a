//! End-to-end coverage of the module subsystem: commit, symbol resolution,
//! parameter access control, rollback, and cycle refusal.

use fimo::context::Context;
use fimo::error::ErrorKind;
use fimo::module::{
    AccessClass, ConstructionContext, ModuleExport, ModuleExportBuilder, ModuleState, ParamValue,
    ParameterDecl, SymbolExport, SymbolImport, SymbolPtr,
};
use fimo::version::Version;
use fimo::ContextOptions;

fn noop_ctor(_ctx: &ConstructionContext) -> Result<ModuleState, String> {
    Ok(Box::new(()))
}
fn noop_dtor(_state: ModuleState) {}

fn failing_ctor(_ctx: &ConstructionContext) -> Result<ModuleState, String> {
    Err("boom".to_owned())
}

static VALUE_FIVE: i32 = 5;

fn exporter() -> &'static ModuleExport {
    static EXPORT: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    EXPORT.get_or_init(|| {
        ModuleExportBuilder::new("exporter")
            .version(Version::new(1, 0, 0))
            .export_symbol(SymbolExport {
                name: "five",
                namespace: "core",
                version: Version::new(1, 0, 0),
                value: SymbolPtr::new(std::ptr::addr_of!(VALUE_FIVE).cast::<()>()),
            })
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    })
}

fn importer() -> &'static ModuleExport {
    static EXPORT: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    EXPORT.get_or_init(|| {
        ModuleExportBuilder::new("importer")
            .version(Version::new(1, 0, 0))
            .import_namespace("core")
            .import_symbol(SymbolImport {
                name: "five",
                namespace: "core",
                required: Version::new(1, 0, 0),
            })
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    })
}

#[test]
fn commits_a_chain_and_resolves_a_static_symbol() {
    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&[exporter(), importer()], |_| true).unwrap();
    let loaded = set.finish().unwrap();
    assert_eq!(loaded.len(), 2);

    let importer_info = ctx.find_by_name("importer").unwrap();
    let handle = ctx
        .load_symbol(&importer_info, "five", "core", Version::new(1, 0, 0))
        .unwrap();
    let value = unsafe { *handle.as_ptr::<i32>() };
    assert_eq!(value, 5);
    assert_eq!(handle.exporter().name(), "exporter");
}

#[test]
fn failing_constructor_rolls_back_every_already_constructed_module() {
    let constructed = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let destructed = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    static OK_EXPORT: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    static BAD_EXPORT: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();

    let ok = OK_EXPORT.get_or_init(|| {
        ModuleExportBuilder::new("ok")
            .version(Version::new(1, 0, 0))
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });
    let bad = BAD_EXPORT.get_or_init(|| {
        ModuleExportBuilder::new("bad")
            .version(Version::new(1, 0, 0))
            .constructor(failing_ctor)
            .destructor(noop_dtor)
            .build()
    });

    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&[ok, bad], |_| true).unwrap();
    set.append_callback(
        "ok",
        {
            let c = constructed.clone();
            move |_info| {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        },
        {
            let d = destructed.clone();
            move || {
                d.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        },
    )
    .unwrap();

    let err = set.finish().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(constructed.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(destructed.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(ctx.find_by_name("ok").is_err());
    assert!(ctx.find_by_name("bad").is_err());
}

#[test]
fn acquiring_a_dependency_that_would_close_a_cycle_is_refused() {
    static A: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    static B: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    let a = A.get_or_init(|| {
        ModuleExportBuilder::new("a")
            .version(Version::new(1, 0, 0))
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });
    let b = B.get_or_init(|| {
        ModuleExportBuilder::new("b")
            .version(Version::new(1, 0, 0))
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });

    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&[a, b], |_| true).unwrap();
    set.finish().unwrap();

    let info_a = ctx.find_by_name("a").unwrap();
    let info_b = ctx.find_by_name("b").unwrap();
    ctx.acquire_dependency(&info_a, &info_b).unwrap();
    let err = ctx.acquire_dependency(&info_b, &info_a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);
}

#[test]
fn parameter_access_matrix_matches_declared_classes() {
    static OWNER: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    static CALLER: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    let owner = OWNER.get_or_init(|| {
        ModuleExportBuilder::new("owner")
            .version(Version::new(1, 0, 0))
            .parameter(ParameterDecl {
                name: "dep_pub",
                default: ParamValue::U32(1),
                read_class: AccessClass::Public,
                write_class: AccessClass::Dependency,
            })
            .parameter(ParameterDecl {
                name: "private_only",
                default: ParamValue::U32(2),
                read_class: AccessClass::Private,
                write_class: AccessClass::Private,
            })
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });
    let caller = CALLER.get_or_init(|| {
        ModuleExportBuilder::new("caller")
            .version(Version::new(1, 0, 0))
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });

    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&[owner, caller], |_| true).unwrap();
    set.finish().unwrap();

    let owner_info = ctx.find_by_name("owner").unwrap();
    let caller_info = ctx.find_by_name("caller").unwrap();

    assert_eq!(
        ctx.param_get_public(&owner_info, "dep_pub").unwrap(),
        ParamValue::U32(1)
    );
    assert!(ctx
        .param_set_dependency(&caller_info, &owner_info, "dep_pub", ParamValue::U32(9))
        .is_err());
    ctx.acquire_dependency(&caller_info, &owner_info).unwrap();
    ctx.param_set_dependency(&caller_info, &owner_info, "dep_pub", ParamValue::U32(9))
        .unwrap();
    assert_eq!(
        ctx.param_get_public(&owner_info, "dep_pub").unwrap(),
        ParamValue::U32(9)
    );

    assert!(ctx.param_get_public(&owner_info, "private_only").is_err());
    assert!(ctx
        .param_get_dependency(&caller_info, &owner_info, "private_only")
        .is_err());
    assert!(ctx
        .param_get_private(&caller_info, &owner_info, "private_only")
        .is_err());
    assert_eq!(
        ctx.param_get_private(&owner_info, &owner_info, "private_only").unwrap(),
        ParamValue::U32(2)
    );
}

#[test]
fn pseudo_module_participates_in_the_dependency_graph() {
    static TARGET: std::sync::OnceLock<ModuleExport> = std::sync::OnceLock::new();
    let target = TARGET.get_or_init(|| {
        ModuleExportBuilder::new("target")
            .version(Version::new(1, 0, 0))
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build()
    });

    let ctx = Context::new(ContextOptions::new());
    let set = ctx.new_loading_set();
    set.append_modules(&[target], |_| true).unwrap();
    set.finish().unwrap();

    let pm = ctx.pseudo_module_new();
    let target_info = ctx.find_by_name("target").unwrap();
    ctx.acquire_dependency(pm.info(), &target_info).unwrap();
    let (has_dep, is_static) = ctx.has_dependency(pm.info(), &target_info).unwrap();
    assert!(has_dep);
    assert!(!is_static);

    let ctx = pm.destroy();
    assert!(ctx.find_by_name("target").is_ok());
}
