//! Subscriber contract.
//!
//! Subscribers are trusted: a panicking subscriber callback is treated the
//! same way the original treats a throwing callback — undefined behavior
//! from the runtime's point of view. The runtime itself never catches
//! unwinding from a subscriber call.

use super::span::{Event, ExitReason, Metadata};

/// A unique identifier for a call stack, passed to subscribers so they can
/// correlate span/event dispatches without holding a reference to the
/// call stack itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallStackId(pub u64);

/// A sink for structured tracing events.
///
/// All methods have no-op default implementations except [`Subscriber::on_event`]
/// and [`Subscriber::on_span_start`]/[`Subscriber::on_span_exit`], so that a
/// minimal subscriber only needs to implement the dispatch path it cares
/// about.
pub trait Subscriber: Send + Sync {
    /// Called when a new call stack is created.
    fn on_call_stack_create(&self, _id: CallStackId) {}

    /// Called when a call stack is destroyed.
    fn on_call_stack_destroy(&self, _id: CallStackId) {}

    /// Called when a span is entered (pushed) onto a call stack.
    fn on_span_start(&self, stack: CallStackId, metadata: &Metadata, message: &str);

    /// Called when a span is exited (popped) from a call stack.
    fn on_span_exit(&self, stack: CallStackId, metadata: &Metadata, reason: ExitReason);

    /// Called for a one-shot logged event.
    fn on_event(&self, stack: CallStackId, event: &Event);

    /// Called when the subsystem wants subscribers to flush any buffered
    /// output (e.g. before process exit).
    fn flush(&self) {}
}

/// The default subscriber used when none is configured: discards
/// everything. Tracing with only `NullSubscriber`s registered (or zero
/// subscribers) is the "disabled" state in which every operation is a
/// cheap default-valued no-op.
#[derive(Debug, Default)]
pub struct NullSubscriber;

impl Subscriber for NullSubscriber {
    fn on_span_start(&self, _stack: CallStackId, _metadata: &Metadata, _message: &str) {}
    fn on_span_exit(&self, _stack: CallStackId, _metadata: &Metadata, _reason: ExitReason) {}
    fn on_event(&self, _stack: CallStackId, _event: &Event) {}
}

/// A subscriber that writes human-readable lines to any `Write`
/// destination, serialized behind a mutex: callbacks for a given
/// subscriber never run concurrently with themselves.
pub struct FormatSubscriber<W> {
    sink: parking_lot::Mutex<W>,
}

impl<W: std::io::Write + Send> FormatSubscriber<W> {
    /// Wraps `sink` as a formatting subscriber.
    pub fn new(sink: W) -> Self {
        Self {
            sink: parking_lot::Mutex::new(sink),
        }
    }
}

impl<W: std::io::Write + Send> Subscriber for FormatSubscriber<W> {
    fn on_span_start(&self, stack: CallStackId, metadata: &Metadata, message: &str) {
        let mut sink = self.sink.lock();
        let _ = writeln!(
            sink,
            "[{}] {{{}}} {}: {} {}",
            metadata.level, stack.0, metadata.target, metadata.name, message
        );
    }

    fn on_span_exit(&self, stack: CallStackId, metadata: &Metadata, reason: ExitReason) {
        let mut sink = self.sink.lock();
        let suffix = match reason {
            ExitReason::Normal => "",
            ExitReason::Unwinding => " (unwinding)",
        };
        let _ = writeln!(
            sink,
            "[{}] {{{}}} exit {}{}",
            metadata.level, stack.0, metadata.name, suffix
        );
    }

    fn on_event(&self, stack: CallStackId, event: &Event) {
        let mut sink = self.sink.lock();
        let _ = writeln!(
            sink,
            "[{}] {{{}}} {}: {} {}",
            event.metadata.level, stack.0, event.metadata.target, event.metadata.name, event.message
        );
    }

    fn flush(&self) {
        let _ = self.sink.lock().flush();
    }
}
