//! Strong/weak reference counting with overflow-abort and a weak-lock for
//! uniqueness checks.
//!
//! Two interchangeable implementations share one state machine: [`RefCount`]
//! (plain `Cell`-based counters for single-threaded control blocks) and
//! [`AtomicRefCount`] (the variant embedded in every shared, cross-thread
//! handle — [`crate::context::Context`], [`crate::module::ModuleInfo`],
//! symbol locks). Both saturate at [`MAX_REFCOUNT`] by aborting the process;
//! wrapping past that threshold would be undefined behavior for any code
//! that assumes the counter fits in an `isize`.

mod atomic;
mod plain;

pub use atomic::AtomicRefCount;
pub use plain::RefCount;

/// The refcount value past which any further increment aborts the process.
///
/// Bounded by `isize::MAX`: a strong or weak counter is never allowed to
/// reach a value that could wrap a signed pointer-sized integer.
pub const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Sentinel weak-count value meaning "locked for a uniqueness check".
///
/// While the weak counter holds this value, concurrent `downgrade` calls
/// must spin rather than proceed, and `weak_count` reads treat it as "no
/// weak references held" (matches `UINTPTR_MAX` in the C source).
pub const LOCKED_SENTINEL: usize = usize::MAX;

/// Failure returned by [`RefCounted::upgrade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeError {
    /// The strong count was already zero; there is nothing left to upgrade.
    Dead,
    /// The strong count is saturated at [`MAX_REFCOUNT`].
    Overflow,
}

impl core::fmt::Display for UpgradeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Dead => f.write_str("refcount: cannot upgrade a dead weak reference"),
            Self::Overflow => f.write_str("refcount: strong count saturated"),
        }
    }
}

impl std::error::Error for UpgradeError {}

/// Failure returned by [`RefCounted::downgrade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DowngradeOverflow;

impl core::fmt::Display for DowngradeOverflow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("refcount: weak count saturated")
    }
}

impl std::error::Error for DowngradeOverflow {}

/// Shared contract implemented identically by [`RefCount`] and
/// [`AtomicRefCount`].
///
/// A refcount that owns exactly one strong reference is created with
/// `strong = 1, weak = 1` (the implicit weak reference held on behalf of
/// every live strong reference).
pub trait RefCounted {
    /// Creates a refcount in the initial state: one strong reference, one
    /// (implicit) weak reference.
    fn new() -> Self;

    /// Returns the current strong count.
    fn strong_count(&self) -> usize;

    /// Returns the current weak count, not counting the implicit weak
    /// reference held while `strong_count() > 0`.
    fn weak_count(&self) -> usize;

    /// Increments the strong count. Aborts the process on overflow.
    fn increment_strong(&self);

    /// Decrements the strong count. Returns `true` iff this decrement took
    /// the strong count from 1 to 0 (the caller must destroy the value).
    fn decrement_strong(&self) -> bool;

    /// Increments the weak count. Aborts the process on overflow.
    fn increment_weak(&self);

    /// Decrements the weak count. Returns `true` iff this decrement took
    /// the weak count to 0 (the caller may free the control block).
    fn decrement_weak(&self) -> bool;

    /// Attempts to upgrade a weak reference into a strong one.
    fn upgrade(&self) -> Result<(), UpgradeError>;

    /// Creates a weak reference from a strong one, without touching the
    /// strong count.
    fn downgrade(&self) -> Result<(), DowngradeOverflow>;

    /// Returns `true` iff there is exactly one strong reference and no
    /// outstanding weak references.
    fn is_unique(&self) -> bool;
}

#[cfg(test)]
mod contract_tests {
    use super::*;

    fn exercise<R: RefCounted>() {
        let rc = R::new();
        assert_eq!(rc.strong_count(), 1);
        assert!(rc.is_unique());

        rc.increment_strong();
        assert_eq!(rc.strong_count(), 2);
        assert!(!rc.is_unique());
        assert!(!rc.decrement_strong());
        assert!(rc.decrement_strong());

        rc.downgrade().unwrap();
        assert_eq!(rc.weak_count(), 1);
        rc.upgrade().unwrap();
        assert_eq!(rc.strong_count(), 2);
        assert!(rc.decrement_weak());
        rc.decrement_strong();
    }

    #[test]
    fn plain_satisfies_contract() {
        exercise::<RefCount>();
    }

    #[test]
    fn atomic_satisfies_contract() {
        exercise::<AtomicRefCount>();
    }

    fn dead_upgrade_fails<R: RefCounted>() {
        let rc = R::new();
        assert!(rc.decrement_strong());
        assert_eq!(rc.upgrade(), Err(UpgradeError::Dead));
    }

    #[test]
    fn plain_dead_upgrade_fails() {
        dead_upgrade_fails::<RefCount>();
    }

    #[test]
    fn atomic_dead_upgrade_fails() {
        dead_upgrade_fails::<AtomicRefCount>();
    }
}
