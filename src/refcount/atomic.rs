use std::sync::atomic::{AtomicUsize, Ordering};

use super::{DowngradeOverflow, RefCounted, UpgradeError, LOCKED_SENTINEL, MAX_REFCOUNT};

/// An atomic strong/weak reference count, shared across threads.
///
/// `strong` uses a relaxed fetch-add on increment and a release
/// decrement followed by an acquire fence on the 1-to-0 transition, so
/// that every write made through the last live reference happens-before
/// the destructor runs. `weak` additionally supports a locked state
/// ([`super::LOCKED_SENTINEL`]) used by [`AtomicRefCount::is_unique`] to
/// block concurrent downgrades during the check.
#[derive(Debug)]
pub struct AtomicRefCount {
    strong: AtomicUsize,
    weak: AtomicUsize,
}

impl RefCounted for AtomicRefCount {
    fn new() -> Self {
        Self {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
        }
    }

    fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Acquire)
    }

    fn weak_count(&self) -> usize {
        let weak = self.weak.load(Ordering::Acquire);
        if weak == LOCKED_SENTINEL {
            0
        } else {
            weak - 1
        }
    }

    fn increment_strong(&self) {
        let old = self.strong.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            eprintln!("fimo: refcount strong count saturated");
            std::process::abort();
        }
    }

    fn decrement_strong(&self) -> bool {
        // Fast path: more than one strong reference remains.
        if self.strong.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        // Synchronizes-with every prior release-decrement, ensuring any
        // access to the guarded value happens-before its destruction.
        self.strong.load(Ordering::Acquire);
        true
    }

    fn increment_weak(&self) {
        let old = self.weak.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            eprintln!("fimo: refcount weak count saturated");
            std::process::abort();
        }
    }

    fn decrement_weak(&self) -> bool {
        if self.weak.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        self.weak.load(Ordering::Acquire);
        true
    }

    fn upgrade(&self) -> Result<(), UpgradeError> {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(UpgradeError::Dead);
            }
            if current > MAX_REFCOUNT {
                return Err(UpgradeError::Overflow);
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn downgrade(&self) -> Result<(), DowngradeOverflow> {
        let mut current = self.weak.load(Ordering::Relaxed);
        loop {
            if current == LOCKED_SENTINEL {
                std::hint::spin_loop();
                current = self.weak.load(Ordering::Relaxed);
                continue;
            }
            if current > MAX_REFCOUNT {
                return Err(DowngradeOverflow);
            }
            match self.weak.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn is_unique(&self) -> bool {
        // Lock the weak counter at 1 so that no concurrent downgrade can
        // observe or mutate it while we inspect the strong count.
        if self
            .weak
            .compare_exchange(1, LOCKED_SENTINEL, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let unique = self.strong.load(Ordering::Acquire) == 1;
        self.weak.store(1, Ordering::Release);
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_strong_increments_balance() {
        let rc = Arc::new(AtomicRefCount::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let rc = Arc::clone(&rc);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    rc.increment_strong();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(rc.strong_count(), 1 + 8 * 1000);
    }

    #[test]
    fn is_unique_true_only_with_one_strong_and_no_weak() {
        let rc = AtomicRefCount::new();
        assert!(rc.is_unique());
        rc.downgrade().unwrap();
        assert!(!rc.is_unique());
        assert!(!rc.decrement_weak());
        assert!(rc.is_unique());
    }

    #[test]
    fn upgrade_after_downgrade_succeeds_while_strong_alive() {
        let rc = AtomicRefCount::new();
        rc.downgrade().unwrap();
        assert!(rc.upgrade().is_ok());
        assert_eq!(rc.strong_count(), 2);
    }

    #[test]
    fn upgrade_fails_once_strong_reaches_zero() {
        let rc = AtomicRefCount::new();
        rc.downgrade().unwrap();
        assert!(rc.decrement_strong());
        assert_eq!(rc.upgrade(), Err(UpgradeError::Dead));
    }
}
