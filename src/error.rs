//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the module and tracing subsystems returns
//! `Result<T, Error>`. Programming errors (null handles, wrong vtable
//! version, misused call stacks, refcount overflow) are not represented
//! here: they panic or abort, matching the "programming errors abort"
//! discipline described for the C original.

use core::fmt;

/// The kind of protocol or environmental failure.
///
/// This mirrors the wire-visible status codes of the original C runtime,
/// minus the `Ok` variant (a Rust `Result::Ok` already carries success).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument was invalid for the operation (e.g. an empty name).
    InvalidArgument,
    /// A numeric value fell outside its accepted range.
    OutOfRange,
    /// A counter or buffer would have overflowed.
    Overflow,
    /// The named entity does not exist.
    NotFound,
    /// An entity with the same identity already exists.
    AlreadyExists,
    /// A loading set could not resolve one or more static imports.
    Unresolved,
    /// A dependency edge would introduce a cycle.
    Cycle,
    /// The caller is not permitted to perform this operation.
    Forbidden,
    /// A parameter was accessed with the wrong scalar type.
    TypeMismatch,
    /// An exported symbol or context is not version-compatible.
    VersionMismatch,
    /// The operation cannot proceed because a resource is in use.
    Busy,
    /// The operation targets an edge or inclusion that is declared statically.
    Static,
    /// An unexpected internal failure (e.g. a staged constructor failed).
    Internal,
}

impl ErrorKind {
    /// Returns the stable, address-free name of this error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::OutOfRange => "out of range",
            Self::Overflow => "overflow",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Unresolved => "unresolved import",
            Self::Cycle => "dependency cycle",
            Self::Forbidden => "forbidden",
            Self::TypeMismatch => "type mismatch",
            Self::VersionMismatch => "version mismatch",
            Self::Busy => "busy",
            Self::Static => "static edge",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned by a fallible runtime operation.
///
/// # Example
///
/// ```
/// use fimo::error::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::Forbidden).with_context("param 'dep_pub' on module 'c'");
/// assert_eq!(err.kind(), ErrorKind::Forbidden);
/// assert!(err.to_string().contains("dep_pub"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}{}", context.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Creates a new error of the given kind with no attached context.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Attaches a human-readable context string to this error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the attached context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

macro_rules! ctor {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[must_use]
        pub const fn $name() -> Self {
            Self::new(ErrorKind::$kind)
        }
    };
}

impl Error {
    ctor!(
        /// Creates an [`ErrorKind::InvalidArgument`] error.
        invalid_argument => InvalidArgument
    );
    ctor!(
        /// Creates an [`ErrorKind::OutOfRange`] error.
        out_of_range => OutOfRange
    );
    ctor!(
        /// Creates an [`ErrorKind::Overflow`] error.
        overflow => Overflow
    );
    ctor!(
        /// Creates a [`ErrorKind::NotFound`] error.
        not_found => NotFound
    );
    ctor!(
        /// Creates an [`ErrorKind::AlreadyExists`] error.
        already_exists => AlreadyExists
    );
    ctor!(
        /// Creates an [`ErrorKind::Unresolved`] error.
        unresolved => Unresolved
    );
    ctor!(
        /// Creates an [`ErrorKind::Cycle`] error.
        cycle => Cycle
    );
    ctor!(
        /// Creates an [`ErrorKind::Forbidden`] error.
        forbidden => Forbidden
    );
    ctor!(
        /// Creates an [`ErrorKind::TypeMismatch`] error.
        type_mismatch => TypeMismatch
    );
    ctor!(
        /// Creates an [`ErrorKind::VersionMismatch`] error.
        version_mismatch => VersionMismatch
    );
    ctor!(
        /// Creates an [`ErrorKind::Busy`] error.
        busy => Busy
    );
    ctor!(
        /// Creates an [`ErrorKind::Static`] error.
        static_edge => Static
    );
    ctor!(
        /// Creates an [`ErrorKind::Internal`] error.
        internal => Internal
    );
}

/// A specialized [`Result`](core::result::Result) for fallible runtime operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_no_addresses() {
        let err = Error::forbidden().with_context("module 'c', param 'pub_dep'");
        let rendered = err.to_string();
        assert!(rendered.contains("forbidden"));
        assert!(rendered.contains("pub_dep"));
        assert!(!rendered.contains("0x"));
    }

    #[test]
    fn display_without_context() {
        let err = Error::not_found();
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn kind_round_trips() {
        for (ctor, kind) in [
            (Error::invalid_argument() as Error, ErrorKind::InvalidArgument),
            (Error::out_of_range(), ErrorKind::OutOfRange),
            (Error::overflow(), ErrorKind::Overflow),
            (Error::cycle(), ErrorKind::Cycle),
            (Error::static_edge(), ErrorKind::Static),
        ] {
            assert_eq!(ctor.kind(), kind);
        }
    }
}
