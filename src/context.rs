//! The process-wide [`Context`]: the reference-counted root that owns the
//! tracing subsystem and the module registry, and the [`PseudoModule`]
//! facade a host program uses to participate in the module graph without
//! itself being a loaded module.
//!
//! Every operation a loaded module's own code would reach through a
//! `FimoContext` vtable in the original runtime (namespace/dependency
//! management, symbol loading, parameter access) is exposed here as a
//! method taking the caller's [`ModuleInfo`] explicitly, so both a
//! [`PseudoModule`] and a module's own constructor/runtime code can drive
//! it through the same surface.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::Result;
use crate::module::{LoadingSet, ModuleInfo, ParamValue, Registry, SymbolHandle};
use crate::refcount::{AtomicRefCount, RefCounted};
use crate::trace::TracingState;
use crate::version::Version;
use crate::config::ContextOptions;

/// The version of the context ABI this build implements.
///
/// A context obtained from a foreign binary must be checked against this
/// with [`Context::check_version`] before its vtable is used further: the
/// first field of every vtable is, conceptually, this check.
pub const CONTEXT_VERSION: Version = Version::new(0, 1, 0);

struct Inner {
    refcount: AtomicRefCount,
    // Dropped before `tracing`: the module state must be torn down before
    // the tracing state when the context's last strong reference is
    // released. Rust drops struct fields in declaration order, so
    // `registry` must appear first.
    registry: Arc<Registry>,
    tracing: TracingState,
}

/// The process-wide runtime handle.
///
/// Cloning (via [`Context::acquire`] or [`Clone::clone`]) increments a
/// strong count backed by [`crate::refcount::AtomicRefCount`]; the context
/// is destroyed when the last clone is dropped.
pub struct Context {
    ptr: NonNull<Inner>,
}

unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    /// Initializes a new context. Mirrors `fimo_context_init`: default
    /// options (tracing disabled) are always valid.
    #[must_use]
    pub fn new(options: ContextOptions) -> Self {
        let inner = Box::new(Inner {
            refcount: AtomicRefCount::new(),
            registry: Registry::new(),
            tracing: TracingState::new(options.tracing),
        });
        Self {
            ptr: NonNull::from(Box::leak(inner)),
        }
    }

    fn inner(&self) -> &Inner {
        unsafe { self.ptr.as_ref() }
    }

    /// Checks whether this build's context ABI is compatible with a
    /// `required` version a caller compiled against.
    ///
    /// Every caller that obtains a [`Context`] from a foreign binary must
    /// call this before using anything else on it.
    #[must_use]
    pub fn check_version(required: Version) -> bool {
        CONTEXT_VERSION.is_compatible_with(&required)
    }

    /// Acquires a new strong handle to this context.
    #[must_use]
    pub fn acquire(&self) -> Self {
        self.inner().refcount.increment_strong();
        Self { ptr: self.ptr }
    }

    /// The number of live strong handles to this context.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner().refcount.strong_count()
    }

    /// The tracing subsystem driven by this context.
    #[must_use]
    pub fn tracing(&self) -> &TracingState {
        &self.inner().tracing
    }

    /// The module registry driven by this context.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner().registry
    }

    /// Opens a new loading set bound to this context's registry.
    #[must_use]
    pub fn new_loading_set(&self) -> LoadingSet {
        self.inner().registry.new_loading_set()
    }

    /// Looks up a loaded module by name.
    pub fn find_by_name(&self, name: &str) -> Result<ModuleInfo> {
        self.inner().registry.find_by_name(name)
    }

    /// Looks up the module that exports `(namespace, name)`.
    pub fn find_by_symbol(&self, namespace: &str, name: &str) -> Result<ModuleInfo> {
        self.inner().registry.find_by_symbol(namespace, name)
    }

    /// Reads a parameter through the public, caller-independent access
    /// class: any caller may read it via this context-level API.
    pub fn param_get_public(&self, owner: &ModuleInfo, name: &str) -> Result<ParamValue> {
        self.inner().registry.param_get_public(owner.name(), name)
    }

    /// Writes a parameter through the public access class.
    pub fn param_set_public(&self, owner: &ModuleInfo, name: &str, value: ParamValue) -> Result<()> {
        self.inner().registry.param_set_public(owner.name(), name, value)
    }

    /// Resolves and locks a symbol on behalf of `importer`.
    pub fn load_symbol(
        &self,
        importer: &ModuleInfo,
        name: &str,
        namespace: &str,
        required: Version,
    ) -> Result<SymbolHandle> {
        self.inner().registry.load_symbol(importer.name(), name, namespace, required)
    }

    /// Idempotently includes `namespace` on `module` (dynamic inclusion).
    pub fn namespace_include(&self, module: &ModuleInfo, namespace: &str) -> Result<()> {
        self.inner().registry.namespace_include(module.name(), namespace)
    }

    /// Excludes `namespace` from `module`.
    pub fn namespace_exclude(&self, module: &ModuleInfo, namespace: &str) -> Result<()> {
        self.inner().registry.namespace_exclude(module.name(), namespace)
    }

    /// Returns `(included, is_static)` for `namespace` on `module`.
    pub fn namespace_included(&self, module: &ModuleInfo, namespace: &str) -> Result<(bool, bool)> {
        self.inner().registry.namespace_included(module.name(), namespace)
    }

    /// Adds an explicit dependency edge `importer -> target`.
    pub fn acquire_dependency(&self, importer: &ModuleInfo, target: &ModuleInfo) -> Result<()> {
        self.inner().registry.acquire_dependency(importer.name(), target.name())
    }

    /// Removes an explicit dependency edge `importer -> target`.
    pub fn relinquish_dependency(&self, importer: &ModuleInfo, target: &ModuleInfo) -> Result<()> {
        self.inner().registry.relinquish_dependency(importer.name(), target.name())
    }

    /// Returns `(has_dependency, is_static)` for `importer -> target`.
    pub fn has_dependency(&self, importer: &ModuleInfo, target: &ModuleInfo) -> Result<(bool, bool)> {
        self.inner().registry.has_dependency(importer.name(), target.name())
    }

    /// Reads a parameter on behalf of `caller`, which must hold a
    /// dependency on `owner`.
    pub fn param_get_dependency(&self, caller: &ModuleInfo, owner: &ModuleInfo, name: &str) -> Result<ParamValue> {
        self.inner().registry.param_get_dependency(caller.name(), owner.name(), name)
    }

    /// Writes a parameter on behalf of `caller`, which must hold a
    /// dependency on `owner`.
    pub fn param_set_dependency(
        &self,
        caller: &ModuleInfo,
        owner: &ModuleInfo,
        name: &str,
        value: ParamValue,
    ) -> Result<()> {
        self.inner().registry.param_set_dependency(caller.name(), owner.name(), name, value)
    }

    /// Reads a parameter as its own owning module.
    pub fn param_get_private(&self, caller: &ModuleInfo, owner: &ModuleInfo, name: &str) -> Result<ParamValue> {
        self.inner().registry.param_get_private(caller.name(), owner.name(), name)
    }

    /// Writes a parameter as its own owning module.
    pub fn param_set_private(
        &self,
        caller: &ModuleInfo,
        owner: &ModuleInfo,
        name: &str,
        value: ParamValue,
    ) -> Result<()> {
        self.inner().registry.param_set_private(caller.name(), owner.name(), name, value)
    }

    /// Unloads `info`'s module. Valid only when the registry is the only
    /// remaining strong holder of it and no symbol locks are outstanding.
    pub fn unload(&self, info: &ModuleInfo) -> Result<()> {
        self.inner().registry.unload(info)
    }

    /// Creates a pseudo-module bound to a freshly acquired handle on this
    /// context: a first-class participant in the module graph (it can
    /// acquire dependencies and load symbols) with no declared parameters,
    /// resources, exports, or constructor of its own.
    #[must_use]
    pub fn pseudo_module_new(&self) -> PseudoModule {
        let info = self.inner().registry.new_pseudo_module();
        PseudoModule {
            context: self.acquire(),
            info,
        }
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.inner().refcount.decrement_strong() {
            unsafe {
                drop(Box::from_raw(self.ptr.as_ptr()));
            }
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("strong_count", &self.strong_count()).finish()
    }
}

/// A host-created stand-in that participates in the module dependency and
/// symbol graph without being a loaded module.
///
/// Has no declared parameters, resources, exports, or constructor; every
/// operation it can perform (acquiring dependencies, loading symbols,
/// including namespaces) goes through the same [`Context`] methods a real
/// module's own code would use, with `self.info()` as the caller.
pub struct PseudoModule {
    context: Context,
    info: ModuleInfo,
}

impl PseudoModule {
    /// This pseudo-module's descriptor, usable anywhere a caller/importer
    /// `ModuleInfo` is expected.
    #[must_use]
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// The context this pseudo-module is bound to.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Destroys the pseudo-module: unwinds every dependency edge it
    /// acquired and returns a fresh [`Context`] handle.
    #[must_use]
    pub fn destroy(self) -> Context {
        let PseudoModule { context, info } = self;
        let name = info.name().to_owned();
        // Drop our own handle first so the registry's handle (held by its
        // `ModuleEntry`) is the only one left, satisfying `unload`'s
        // "registry is the only remaining strong holder" precondition.
        drop(info);
        context
            .registry()
            .unload_by_name(&name)
            .expect("pseudo-module teardown: unload should never fail for a module with no outstanding holders");
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_check_acquire_release() {
        let ctx = Context::new(ContextOptions::default());
        assert!(Context::check_version(CONTEXT_VERSION));
        let a = ctx.acquire();
        let b = ctx.acquire();
        assert_eq!(ctx.strong_count(), 3);
        drop(a);
        drop(b);
        assert_eq!(ctx.strong_count(), 1);
        drop(ctx);
    }

    #[test]
    fn pseudo_module_round_trips_through_context() {
        let ctx = Context::new(ContextOptions::default());
        let pm = ctx.pseudo_module_new();
        assert!(pm.info().is_loaded());
        let ctx2 = pm.destroy();
        assert!(ctx2.find_by_name("whatever").is_err());
    }
}
