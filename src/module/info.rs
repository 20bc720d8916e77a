//! The public, reference-counted module descriptor.
//!
//! `ModuleInfo` is a hand-rolled strong handle and `ModuleInfoWeak` its weak
//! counterpart, both backed directly by [`crate::refcount::AtomicRefCount`]
//! rather than `std::sync::Arc`: the module-info/module relation is exactly
//! the "shared-ownership DAG with weak back-edges" the refcount primitive
//! exists to drive.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::refcount::{AtomicRefCount, RefCounted, UpgradeError};
use crate::version::Version;

struct Inner {
    refcount: AtomicRefCount,
    name: String,
    version: Version,
    unload_locks: AtomicUsize,
}

/// A strong, reference-counted handle to a module's public descriptor.
///
/// A module is considered loaded precisely while its strong count is at
/// least one.
/// The registry itself holds one such handle for every loaded module;
/// `unload` requires that handle be the only one left before it tears the
/// module down.
pub struct ModuleInfo {
    ptr: NonNull<Inner>,
}

unsafe impl Send for ModuleInfo {}
unsafe impl Sync for ModuleInfo {}

impl ModuleInfo {
    pub(crate) fn new(name: String, version: Version) -> Self {
        let inner = Box::new(Inner {
            refcount: AtomicRefCount::new(),
            name,
            version,
            unload_locks: AtomicUsize::new(0),
        });
        Self {
            ptr: NonNull::from(Box::leak(inner)),
        }
    }

    fn inner(&self) -> &Inner {
        unsafe { self.ptr.as_ref() }
    }

    /// The module's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner().name
    }

    /// The module's declared version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.inner().version
    }

    /// Returns `true` iff the module currently holds at least one strong
    /// reference, i.e. is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner().refcount.strong_count() >= 1
    }

    /// Acquires a new strong handle, incrementing the strong count.
    #[must_use]
    pub fn acquire(&self) -> Self {
        self.inner().refcount.increment_strong();
        Self { ptr: self.ptr }
    }

    /// Downgrades to a non-owning weak handle.
    #[must_use]
    pub fn downgrade(&self) -> ModuleInfoWeak {
        if self.inner().refcount.downgrade().is_err() {
            eprintln!("fimo: module info weak count saturated");
            std::process::abort();
        }
        ModuleInfoWeak { ptr: self.ptr }
    }

    /// Pins this module against concurrent unload. Paired with
    /// [`ModuleInfo::unlock_unload`].
    pub fn lock_unload(&self) {
        self.inner().unload_locks.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases a pin taken by [`ModuleInfo::lock_unload`]. Calling this
    /// without a matching lock is a programming error and panics.
    pub fn unlock_unload(&self) {
        let prev = self.inner().unload_locks.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "unlock_unload called without a matching lock_unload");
    }

    /// Returns `true` iff at least one unload lock is currently held.
    #[must_use]
    pub fn is_unload_locked(&self) -> bool {
        self.inner().unload_locks.load(Ordering::Acquire) > 0
    }
}

impl Clone for ModuleInfo {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl Drop for ModuleInfo {
    fn drop(&mut self) {
        // A strong-to-zero transition releases the implicit weak
        // reference held on behalf of every live strong handle; `Inner`
        // is only deallocated once *that* decrement also reaches zero,
        // matching `Arc`'s discipline so an outstanding `ModuleInfoWeak`
        // never outlives the control block it points at.
        if self.inner().refcount.decrement_strong() && self.inner().refcount.decrement_weak() {
            unsafe {
                drop(Box::from_raw(self.ptr.as_ptr()));
            }
        }
    }
}

impl std::fmt::Debug for ModuleInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInfo")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// A non-owning, weak handle to a module's descriptor. Does not keep the
/// module alive; [`ModuleInfoWeak::upgrade`] fails once the module's
/// strong count has reached zero.
pub struct ModuleInfoWeak {
    ptr: NonNull<Inner>,
}

unsafe impl Send for ModuleInfoWeak {}
unsafe impl Sync for ModuleInfoWeak {}

impl ModuleInfoWeak {
    /// Attempts to upgrade to a strong handle. Fails with
    /// [`UpgradeError::Dead`] if the module's strong count has already
    /// reached zero.
    pub fn upgrade(&self) -> Result<ModuleInfo, UpgradeError> {
        let inner = unsafe { self.ptr.as_ref() };
        inner.refcount.upgrade()?;
        Ok(ModuleInfo { ptr: self.ptr })
    }
}

impl Clone for ModuleInfoWeak {
    fn clone(&self) -> Self {
        if unsafe { self.ptr.as_ref() }.refcount.downgrade().is_err() {
            eprintln!("fimo: module info weak count saturated");
            std::process::abort();
        }
        Self { ptr: self.ptr }
    }
}

impl Drop for ModuleInfoWeak {
    fn drop(&mut self) {
        let inner = unsafe { self.ptr.as_ref() };
        if inner.refcount.decrement_weak() {
            unsafe {
                drop(Box::from_raw(self.ptr.as_ptr()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_module_info_is_loaded() {
        let info = ModuleInfo::new("a".into(), Version::new(0, 1, 0));
        assert!(info.is_loaded());
        assert_eq!(info.name(), "a");
    }

    #[test]
    fn dropping_last_strong_marks_unloaded_state_unreachable() {
        let info = ModuleInfo::new("a".into(), Version::new(1, 0, 0));
        let weak = info.downgrade();
        drop(info);
        assert!(weak.upgrade().is_err());
    }

    #[test]
    fn acquire_release_balances() {
        let info = ModuleInfo::new("a".into(), Version::new(1, 0, 0));
        let second = info.acquire();
        drop(info);
        assert!(second.is_loaded());
    }

    #[test]
    fn unload_lock_tracks_pin_state() {
        let info = ModuleInfo::new("a".into(), Version::new(1, 0, 0));
        assert!(!info.is_unload_locked());
        info.lock_unload();
        assert!(info.is_unload_locked());
        info.unlock_unload();
        assert!(!info.is_unload_locked());
    }

    #[test]
    #[should_panic(expected = "unlock_unload called without a matching lock_unload")]
    fn unmatched_unlock_panics() {
        let info = ModuleInfo::new("a".into(), Version::new(1, 0, 0));
        info.unlock_unload();
    }

    #[test]
    fn weak_handle_does_not_keep_the_module_alive() {
        let info = ModuleInfo::new("probe".into(), Version::new(1, 0, 0));
        let weak = info.downgrade();
        assert!(weak.upgrade().is_ok());

        drop(info);
        assert!(weak.upgrade().is_err());
    }

    #[test]
    fn module_info_survives_as_long_as_one_strong_handle_remains() {
        let info = ModuleInfo::new("probe".into(), Version::new(1, 0, 0));
        let second = info.acquire();
        let weak = info.downgrade();

        drop(info);
        assert!(weak.upgrade().is_ok(), "second handle should still keep it alive");

        drop(second);
        assert!(weak.upgrade().is_err());
    }
}
