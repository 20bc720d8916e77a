use std::cell::Cell;

use super::{DowngradeOverflow, RefCounted, UpgradeError, LOCKED_SENTINEL, MAX_REFCOUNT};

/// A non-atomic strong/weak reference count for single-threaded control
/// blocks (e.g. a loading set's staged module bookkeeping, which never
/// crosses a thread boundary before it is committed or dismissed).
#[derive(Debug)]
pub struct RefCount {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

impl RefCounted for RefCount {
    fn new() -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(1),
        }
    }

    fn strong_count(&self) -> usize {
        self.strong.get()
    }

    fn weak_count(&self) -> usize {
        let weak = self.weak.get();
        if weak == LOCKED_SENTINEL {
            0
        } else {
            weak - 1
        }
    }

    fn increment_strong(&self) {
        let old = self.strong.get();
        if old > MAX_REFCOUNT {
            eprintln!("fimo: refcount strong count saturated");
            std::process::abort();
        }
        self.strong.set(old + 1);
    }

    fn decrement_strong(&self) -> bool {
        let old = self.strong.get();
        self.strong.set(old - 1);
        old == 1
    }

    fn increment_weak(&self) {
        let old = self.weak.get();
        if old > MAX_REFCOUNT {
            eprintln!("fimo: refcount weak count saturated");
            std::process::abort();
        }
        self.weak.set(old + 1);
    }

    fn decrement_weak(&self) -> bool {
        let old = self.weak.get();
        self.weak.set(old - 1);
        old == 1
    }

    fn upgrade(&self) -> Result<(), UpgradeError> {
        let strong = self.strong.get();
        if strong == 0 {
            return Err(UpgradeError::Dead);
        }
        if strong > MAX_REFCOUNT {
            return Err(UpgradeError::Overflow);
        }
        self.strong.set(strong + 1);
        Ok(())
    }

    fn downgrade(&self) -> Result<(), DowngradeOverflow> {
        let weak = self.weak.get();
        if weak > MAX_REFCOUNT {
            return Err(DowngradeOverflow);
        }
        self.weak.set(weak + 1);
        Ok(())
    }

    fn is_unique(&self) -> bool {
        self.strong.get() == 1 && self.weak.get() == 1
    }
}
