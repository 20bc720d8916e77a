//! Per-thread call stack state machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::trace::span::EnteredSpan;
use crate::trace::subscriber::CallStackId;

/// A call stack is either actively in use by its owning thread, or
/// suspended (optionally blocked, meaning it must be explicitly unblocked
/// before it can be resumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Suspended and not blocked: may be resumed or swapped in.
    SuspendedUnblocked,
    /// Suspended and blocked: must be unblocked before resume/swap-in.
    SuspendedBlocked,
    /// Actively in use by the thread that installed it.
    Active,
}

#[derive(Debug)]
struct CallStackData {
    status: Status,
    spans: Vec<EnteredSpan>,
}

/// A handle to a call stack: cheap to clone, reference-counted.
///
/// An ordered stack of entered spans, together with one of the three
/// states in [`Status`].
#[derive(Debug, Clone)]
pub struct CallStack {
    id: CallStackId,
    data: Arc<Mutex<CallStackData>>,
}

impl PartialEq for CallStack {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}
impl Eq for CallStack {}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl CallStack {
    /// Creates a new call stack in the initial state: suspended, unblocked,
    /// empty, not owned by any thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: CallStackId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            data: Arc::new(Mutex::new(CallStackData {
                status: Status::SuspendedUnblocked,
                spans: Vec::new(),
            })),
        }
    }

    /// Returns this call stack's identifier (stable for its lifetime, used
    /// to correlate subscriber dispatches).
    #[must_use]
    pub const fn id(&self) -> CallStackId {
        self.id
    }

    /// Returns the current state-machine status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.data.lock().status
    }

    /// Returns `true` if the call stack currently has no entered spans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().spans.is_empty()
    }

    pub(crate) fn force_active(&self) {
        self.data.lock().status = Status::Active;
    }

    pub(crate) fn suspend(&self, blocked: bool) -> Result<()> {
        let mut data = self.data.lock();
        if data.status != Status::Active {
            return Err(Error::internal().with_context("suspend_current: stack is not active"));
        }
        data.status = if blocked {
            Status::SuspendedBlocked
        } else {
            Status::SuspendedUnblocked
        };
        Ok(())
    }

    pub(crate) fn resume(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.status != Status::SuspendedUnblocked {
            return Err(Error::internal().with_context("resume_current: stack is not suspended-unblocked"));
        }
        data.status = Status::Active;
        Ok(())
    }

    pub(crate) fn unblock(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.status != Status::SuspendedBlocked {
            return Err(Error::internal().with_context("unblock: stack is not suspended-blocked"));
        }
        data.status = Status::SuspendedUnblocked;
        Ok(())
    }

    /// Requires `self` to be suspended (any flavor) and not active, takes
    /// it to `Active`. Used by `swap_active` for the incoming stack, which
    /// must additionally be unblocked.
    pub(crate) fn activate_as_new(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.status != Status::SuspendedUnblocked {
            return Err(Error::invalid_argument()
                .with_context("swap_active: new call stack must be suspended and unblocked"));
        }
        data.status = Status::Active;
        Ok(())
    }

    pub(crate) fn push_span(&self, span: EnteredSpan) {
        self.data.lock().spans.push(span);
    }

    pub(crate) fn pop_span(&self) -> Option<EnteredSpan> {
        self.data.lock().spans.pop()
    }

    pub(crate) fn peek_span(&self) -> Option<EnteredSpan> {
        self.data.lock().spans.last().cloned()
    }

    pub(crate) fn drain_unwind(&self) -> Vec<EnteredSpan> {
        let mut data = self.data.lock();
        std::mem::take(&mut data.spans)
    }

    /// Destroys the call stack: requires it be suspended, not active, and
    /// (unless `abort`) empty. Returns the spans that were unwound, if any.
    pub(crate) fn destroy(&self, abort: bool) -> Result<Vec<EnteredSpan>> {
        let status = self.status();
        if status == Status::Active {
            return Err(Error::busy().with_context("destroy: call stack is active"));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if abort {
            Ok(self.drain_unwind())
        } else {
            Err(Error::busy().with_context("destroy: call stack is not empty"))
        }
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stack_is_suspended_unblocked_and_empty() {
        let stack = CallStack::new();
        assert_eq!(stack.status(), Status::SuspendedUnblocked);
        assert!(stack.is_empty());
    }

    #[test]
    fn suspend_requires_active() {
        let stack = CallStack::new();
        assert!(stack.suspend(false).is_err());
        stack.force_active();
        assert!(stack.suspend(false).is_ok());
        assert_eq!(stack.status(), Status::SuspendedUnblocked);
    }

    #[test]
    fn resume_requires_suspended_unblocked() {
        let stack = CallStack::new();
        stack.force_active();
        stack.suspend(true).unwrap();
        assert_eq!(stack.status(), Status::SuspendedBlocked);
        assert!(stack.resume().is_err());
        stack.unblock().unwrap();
        assert!(stack.resume().is_ok());
        assert_eq!(stack.status(), Status::Active);
    }

    #[test]
    fn destroy_requires_not_active_and_empty() {
        let stack = CallStack::new();
        stack.force_active();
        assert!(stack.destroy(false).is_err());
        stack.suspend(false).unwrap();
        assert!(stack.destroy(false).is_ok());
    }

    #[test]
    fn destroy_with_abort_unwinds_nonempty_stack() {
        use crate::trace::level::Level;
        use crate::trace::span::Metadata;
        let stack = CallStack::new();
        stack.force_active();
        stack.push_span(EnteredSpan {
            metadata: Metadata::new("s", "t", Level::Info),
            message: String::new(),
            start: std::time::Instant::now(),
        });
        stack.suspend(false).unwrap();
        let unwound = stack.destroy(true).unwrap();
        assert_eq!(unwound.len(), 1);
    }
}
