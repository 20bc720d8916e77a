//! Exported symbols and the locks that pin their exporting module alive.

use std::sync::Arc;

use crate::module::info::ModuleInfo;
use crate::version::Version;

/// An opaque, type-erased symbol value.
///
/// `Send`/`Sync` are asserted by the exporting module at declaration time;
/// the subsystem never dereferences the pointer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolPtr(*const ());

impl SymbolPtr {
    /// Wraps a raw pointer as a symbol value.
    #[must_use]
    pub const fn new(ptr: *const ()) -> Self {
        Self(ptr)
    }

    /// Casts the symbol value to `*const T`.
    ///
    /// # Safety
    /// The caller must know the exporter actually stored a `T` at this
    /// address, and the returned pointer must not outlive the
    /// [`SymbolHandle`] that produced it.
    #[must_use]
    pub const unsafe fn cast<T>(self) -> *const T {
        self.0.cast::<T>()
    }
}

unsafe impl Send for SymbolPtr {}
unsafe impl Sync for SymbolPtr {}

/// A declared symbol export: identity, the version it was exported at, and
/// its value.
///
/// `value` is a `'static` address known at compile time (e.g. a reference
/// to a module-private `static`), exactly as the original runtime's
/// linker-populated export records carry a fixed address for every
/// statically declared export. Exports only known once construction has
/// run use [`crate::module::export::ConstructionContext::export_symbol_dynamic`]
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolExport {
    /// The symbol's name, unique within its namespace.
    pub name: &'static str,
    /// The namespace the symbol belongs to.
    pub namespace: &'static str,
    /// The version the export was published at; compatibility baseline for
    /// importers.
    pub version: Version,
    /// The exported value.
    pub value: SymbolPtr,
}

/// A declared symbol import: identity plus the minimum version required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolImport {
    /// The symbol's name.
    pub name: &'static str,
    /// The namespace the symbol belongs to.
    pub namespace: &'static str,
    /// The minimum compatible version required by the importer.
    pub required: Version,
}

pub(crate) struct LockCounter {
    count: std::sync::atomic::AtomicUsize,
}

impl LockCounter {
    pub(crate) fn new() -> Self {
        Self {
            count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn acquire(&self) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        let prev = self.count.fetch_sub(1, std::sync::atomic::Ordering::AcqRel);
        debug_assert!(prev > 0, "symbol lock released without a matching acquire");
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.count.load(std::sync::atomic::Ordering::Acquire) > 0
    }
}

/// A held lock on a resolved symbol.
///
/// While a `SymbolHandle` is alive, the exporting module cannot be
/// unloaded. Dropping the handle releases the lock.
pub struct SymbolHandle {
    export: SymbolExport,
    value: SymbolPtr,
    exporter: ModuleInfo,
    lock: Arc<LockCounter>,
}

impl SymbolHandle {
    pub(crate) fn new(
        export: SymbolExport,
        value: SymbolPtr,
        exporter: ModuleInfo,
        lock: Arc<LockCounter>,
    ) -> Self {
        lock.acquire();
        Self {
            export,
            value,
            exporter,
            lock,
        }
    }

    /// The export identity this handle resolved to.
    #[must_use]
    pub const fn export(&self) -> &SymbolExport {
        &self.export
    }

    /// The module that exported this symbol; pinned alive for as long as
    /// this handle (or any clone of it) exists.
    #[must_use]
    pub fn exporter(&self) -> &ModuleInfo {
        &self.exporter
    }

    /// Casts the underlying value to `*const T`.
    ///
    /// # Safety
    /// The caller must know the exporter actually published a `T` under
    /// this name/namespace.
    #[must_use]
    pub unsafe fn as_ptr<T>(&self) -> *const T {
        self.value.cast::<T>()
    }
}

impl Clone for SymbolHandle {
    fn clone(&self) -> Self {
        self.lock.acquire();
        Self {
            export: self.export,
            value: self.value,
            exporter: self.exporter.acquire(),
            lock: Arc::clone(&self.lock),
        }
    }
}

impl Drop for SymbolHandle {
    fn drop(&mut self) {
        self.lock.release();
    }
}
