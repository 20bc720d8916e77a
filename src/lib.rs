//! A C-ABI systems runtime: module discovery and dependency/namespace-aware
//! linking, semver-gated symbol resolution, access-controlled parameters,
//! refcounted module lifecycles, and structured, per-thread-call-stack
//! tracing.
//!
//! # Overview
//!
//! A host program creates a [`context::Context`], optionally registers
//! itself as a [`context::PseudoModule`] to participate in the dependency
//! graph, and loads modules through a [`module::LoadingSet`]: a
//! transactional staging area that resolves static imports, topologically
//! orders constructors, and rolls every already-constructed module back if
//! a later one fails.
//!
//! # Core Guarantees
//!
//! - A module is loaded precisely while its [`module::ModuleInfo`] strong
//!   count is at least one; `unload` requires the registry's own handle be
//!   the last one standing.
//! - Static dependency/namespace edges, declared on a module's
//!   [`module::ModuleExport`], can never be relinquished at runtime; only
//!   edges acquired dynamically through [`context::Context`] can be.
//! - Symbol resolution is namespace- and dependency-gated and
//!   version-checked; a resolved [`module::SymbolHandle`] pins its
//!   exporter alive for as long as it (or a clone) lives.
//! - Every fallible operation returns [`error::Result`]; only genuine
//!   programming errors (refcount overflow, call-stack misuse, a vtable
//!   version check performed on an incompatible context) panic or abort.
//!
//! # Module Structure
//!
//! - [`refcount`] — the hand-rolled strong/weak reference counting
//!   primitive shared by [`context::Context`], [`module::ModuleInfo`], and
//!   symbol locks.
//! - [`version`] — semantic versions and the compatibility rule used
//!   throughout symbol and module resolution.
//! - [`error`] — the crate-wide error taxonomy.
//! - [`trace`] — the structured tracing subsystem.
//! - [`module`] — the registry, loading sets, dependency/namespace
//!   bookkeeping, parameters, and symbol records.
//! - [`config`] — construction-time [`context::Context`] options.
//! - [`context`] — the process-wide [`context::Context`] and
//!   [`context::PseudoModule`].

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod context;
pub mod error;
pub mod module;
pub mod refcount;
pub mod trace;
pub mod version;

#[cfg(feature = "macros")]
pub use fimo_macros::fimo_module;

pub use config::ContextOptions;
pub use context::{Context, PseudoModule};
pub use error::{Error, ErrorKind, Result};
pub use version::Version;
