//! The module subsystem: registry, loading sets, dependency and namespace
//! bookkeeping, parameters, and symbol resolution.
//!
//! Covers set lifecycle and commit, symbol acquisition, namespace and
//! dependency management, parameter access control, and unload, behind the
//! safe wrapper types re-exported below. [`crate::context::Context`] is the
//! intended entry point; the types here are public so that a module's own
//! constructor code (receiving a [`export::ConstructionContext`]) and
//! advanced callers can work with them directly.

pub mod dependency;
pub mod export;
pub mod info;
pub mod loading_set;
pub mod namespace;
pub mod parameter;
pub mod registry;
pub mod symbol;

pub use export::{ConstructionContext, ConstructorFn, DestructorFn, ModuleExport, ModuleExportBuilder, ModuleState};
pub use info::{ModuleInfo, ModuleInfoWeak};
pub use loading_set::LoadingSet;
pub use parameter::{AccessClass, ParamType, ParamValue, ParameterDecl};
pub use registry::Registry;
pub use symbol::{SymbolExport, SymbolHandle, SymbolImport, SymbolPtr};
