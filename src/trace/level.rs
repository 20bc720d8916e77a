//! Tracing severity levels.

use core::fmt;

/// Severity level for spans and events, plus the `Off` sentinel used only
/// as a maximum-level setting to disable tracing entirely.
///
/// Numeric ordering matches the original runtime exactly (`Off` is the
/// smallest value so that `level as u8 <= max_level as u8` is the single
/// filtering rule for every level, `Off` included): `Off < Error < Warn <
/// Info < Debug < Trace`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    /// Tracing is disabled; never used as an event/span level, only as a
    /// maximum-level setting.
    #[default]
    Off = 0,
    /// Error conditions.
    Error = 1,
    /// Potentially problematic situations.
    Warn = 2,
    /// General informational messages.
    Info = 3,
    /// Debugging information for development.
    Debug = 4,
    /// Fine-grained debugging information (very verbose).
    Trace = 5,
}

impl Level {
    /// Returns the level name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Returns `true` if an event at `self` would be delivered when the
    /// subsystem's maximum level is `max_level`.
    #[must_use]
    pub const fn is_enabled_at(self, max_level: Self) -> bool {
        (self as u8) <= (max_level as u8)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
