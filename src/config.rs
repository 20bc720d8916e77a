//! Construction-time configuration for a [`crate::context::Context`].
//!
//! Mirrors the original runtime's `fimo_context_init(options, ...)` entry
//! point: a `NULL`/default options value is always valid, and every field
//! has a sensible default so a host can opt into only what it needs.

use crate::trace::TracingConfig;

/// Options accepted by [`crate::context::Context::new`].
///
/// The default value matches `fimo_context_init(NULL, ...)`: tracing
/// disabled (no subscribers, [`crate::trace::Level::Off`]).
#[derive(Default)]
pub struct ContextOptions {
    /// Tracing subsystem configuration.
    pub tracing: TracingConfig,
}

impl ContextOptions {
    /// Starts from the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tracing configuration.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Level;

    #[test]
    fn default_options_disable_tracing() {
        let options = ContextOptions::new();
        assert_eq!(options.tracing.max_level, Level::Off);
        assert!(options.tracing.subscribers.is_empty());
    }
}
