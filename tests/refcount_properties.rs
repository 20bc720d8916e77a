//! Property tests for the strong/weak refcount round-trip laws from
//! spec.md §8, exercised against both the plain and atomic variants through
//! the shared [`RefCounted`] trait.

use proptest::prelude::*;

use fimo::refcount::{AtomicRefCount, RefCount, RefCounted};

#[derive(Debug, Clone, Copy)]
enum Op {
    IncStrong,
    DecStrong,
    Downgrade,
    Upgrade,
    IncWeak,
    DecWeak,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::IncStrong),
        Just(Op::DecStrong),
        Just(Op::Downgrade),
        Just(Op::Upgrade),
        Just(Op::IncWeak),
        Just(Op::DecWeak),
    ]
}

/// Replays `ops` against a fresh refcount, tracking how many strong/weak
/// "slots" the test harness itself believes are outstanding, and asserts
/// the refcount's own counters never disagree with that model once an
/// operation is known to have succeeded.
fn replay<R: RefCounted>(ops: &[Op]) {
    let rc = R::new();
    let mut strong = 1i64;
    let mut weak = 1i64; // implicit weak, matches RefCounted::new's contract

    for op in ops {
        match op {
            Op::IncStrong => {
                rc.increment_strong();
                strong += 1;
            }
            Op::DecStrong => {
                if strong == 0 {
                    continue; // nothing left to decrement in this model
                }
                let destroy = rc.decrement_strong();
                strong -= 1;
                assert_eq!(destroy, strong == 0);
            }
            Op::Downgrade => {
                if rc.downgrade().is_ok() {
                    weak += 1;
                }
            }
            Op::Upgrade => {
                if rc.upgrade().is_ok() {
                    strong += 1;
                }
            }
            Op::IncWeak => {
                rc.increment_weak();
                weak += 1;
            }
            Op::DecWeak => {
                if weak <= 1 {
                    continue; // would touch the implicit weak; skip in the model
                }
                rc.decrement_weak();
                weak -= 1;
            }
        }
        if strong > 0 {
            assert_eq!(rc.strong_count() as i64, strong);
        }
    }
}

proptest! {
    /// `downgrade` then `upgrade` returns a strong ref iff strong was
    /// nonzero throughout (spec.md §8 round-trip law).
    #[test]
    fn downgrade_then_upgrade_succeeds_iff_strong_was_alive(decrement_first in any::<bool>()) {
        let rc = AtomicRefCount::new();
        if decrement_first {
            prop_assert!(rc.decrement_strong());
            prop_assert!(rc.downgrade().is_ok());
            prop_assert_eq!(rc.upgrade(), Err(fimo::refcount::UpgradeError::Dead));
        } else {
            prop_assert!(rc.downgrade().is_ok());
            prop_assert!(rc.upgrade().is_ok());
            prop_assert_eq!(rc.strong_count(), 2);
        }
    }

    /// A random sequence of increments/decrements never desynchronizes the
    /// refcount's own counters from a simple reference model, for both
    /// variants.
    #[test]
    fn random_op_sequences_stay_consistent(ops in prop::collection::vec(op_strategy(), 0..64)) {
        replay::<RefCount>(&ops);
        replay::<AtomicRefCount>(&ops);
    }

    /// `is_unique` is true exactly when strong == 1 and no weak references
    /// (beyond the implicit one) are outstanding.
    #[test]
    fn is_unique_matches_definition(extra_strong in 0u32..3, extra_weak in 0u32..3) {
        let rc = AtomicRefCount::new();
        for _ in 0..extra_strong {
            rc.increment_strong();
        }
        for _ in 0..extra_weak {
            rc.downgrade().unwrap();
        }
        let expected = extra_strong == 0 && extra_weak == 0;
        prop_assert_eq!(rc.is_unique(), expected);
    }
}
