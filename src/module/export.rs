//! Declarative module export records and the builder that assembles them.
//!
//! Discovering these records by iterating a platform-specific linker
//! section populated by the build has no portable, safe equivalent across
//! ELF/Mach-O/PE, so this crate does not attempt it: a host program
//! assembles an explicit `&[&'static ModuleExport]` slice (typically one
//! `static` per module, built once via [`ModuleExportBuilder`] or the
//! `#[fimo_module]` attribute macro) and hands it to
//! [`crate::module::loading_set::LoadingSet::append_modules`].

use parking_lot::Mutex;

use crate::module::parameter::ParameterDecl;
use crate::module::symbol::{SymbolExport, SymbolImport};

// NB: `SymbolExport` itself now carries the exported value (see
// `crate::module::symbol`), so a dynamic export needs no separate pointer
// parameter beyond the export record.
use crate::version::Version;

/// The value a constructor returns on success: the module's own opaque
/// state, kept alive until the destructor runs.
pub type ModuleState = Box<dyn std::any::Any + Send + Sync>;

/// A module constructor: receives a [`ConstructionContext`] for registering
/// dynamic exports and returns the module's opaque state, or an error
/// message on failure.
pub type ConstructorFn = fn(&ConstructionContext) -> Result<ModuleState, String>;

/// A module destructor: receives back the state the constructor produced.
pub type DestructorFn = fn(ModuleState);

/// A declarative module export record: everything needed to construct,
/// register, and later tear down one module.
pub struct ModuleExport {
    /// The module's unique name.
    pub name: &'static str,
    /// A short human-readable description.
    pub description: Option<&'static str>,
    /// The module's author.
    pub author: Option<&'static str>,
    /// The module's license identifier.
    pub license: Option<&'static str>,
    /// The module's own declared version.
    pub version: Version,
    /// Parameters this module owns, with their default values and access
    /// classes.
    pub parameters: &'static [ParameterDecl],
    /// Named resource paths, handed back to the module verbatim; path
    /// resolution is out of scope for this crate.
    pub resources: &'static [(&'static str, &'static str)],
    /// Namespaces statically included at construction time.
    pub namespace_imports: &'static [&'static str],
    /// Symbols this module statically imports.
    pub symbol_imports: &'static [SymbolImport],
    /// Symbols this module statically exports.
    pub symbol_exports: &'static [SymbolExport],
    /// Constructs the module's state.
    pub constructor: ConstructorFn,
    /// Tears down the module's state.
    pub destructor: DestructorFn,
}

/// Per-construction-call context passed to a module's [`ConstructorFn`].
///
/// Lets a constructor register symbols it only knows how to export once
/// it has run (the original's "dynamic symbol exports").
pub struct ConstructionContext {
    module_name: &'static str,
    dynamic_exports: Mutex<Vec<SymbolExport>>,
}

impl ConstructionContext {
    pub(crate) fn new(module_name: &'static str) -> Self {
        Self {
            module_name,
            dynamic_exports: Mutex::new(Vec::new()),
        }
    }

    /// The name of the module currently being constructed.
    #[must_use]
    pub const fn module_name(&self) -> &'static str {
        self.module_name
    }

    /// Registers a symbol export that only exists once construction has
    /// run (as opposed to the statically declared exports on
    /// [`ModuleExport::symbol_exports`]). `export.value` carries the
    /// pointer, exactly as with a static export.
    pub fn export_symbol_dynamic(&self, export: SymbolExport) {
        self.dynamic_exports.lock().push(export);
    }

    pub(crate) fn into_dynamic_exports(self) -> Vec<SymbolExport> {
        self.dynamic_exports.into_inner()
    }
}

/// Incrementally assembles a [`ModuleExport`], leaking its backing storage
/// on [`ModuleExportBuilder::build`] to produce the `'static` slices the
/// record requires. Intended to be used once per module, typically from
/// the `#[fimo_module]` attribute macro.
#[derive(Default)]
pub struct ModuleExportBuilder {
    name: Option<&'static str>,
    description: Option<&'static str>,
    author: Option<&'static str>,
    license: Option<&'static str>,
    version: Option<Version>,
    parameters: Vec<ParameterDecl>,
    resources: Vec<(&'static str, &'static str)>,
    namespace_imports: Vec<&'static str>,
    symbol_imports: Vec<SymbolImport>,
    symbol_exports: Vec<SymbolExport>,
    constructor: Option<ConstructorFn>,
    destructor: Option<DestructorFn>,
}

impl ModuleExportBuilder {
    /// Starts a new builder for a module named `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    /// Sets the module's description.
    #[must_use]
    pub fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the module's author.
    #[must_use]
    pub fn author(mut self, author: &'static str) -> Self {
        self.author = Some(author);
        self
    }

    /// Sets the module's license identifier.
    #[must_use]
    pub fn license(mut self, license: &'static str) -> Self {
        self.license = Some(license);
        self
    }

    /// Sets the module's declared version.
    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Declares an owned parameter.
    #[must_use]
    pub fn parameter(mut self, decl: ParameterDecl) -> Self {
        self.parameters.push(decl);
        self
    }

    /// Declares a named resource path.
    #[must_use]
    pub fn resource(mut self, name: &'static str, path: &'static str) -> Self {
        self.resources.push((name, path));
        self
    }

    /// Declares a statically included namespace.
    #[must_use]
    pub fn import_namespace(mut self, namespace: &'static str) -> Self {
        self.namespace_imports.push(namespace);
        self
    }

    /// Declares a statically imported symbol.
    #[must_use]
    pub fn import_symbol(mut self, import: SymbolImport) -> Self {
        self.symbol_imports.push(import);
        self
    }

    /// Declares a statically exported symbol.
    #[must_use]
    pub fn export_symbol(mut self, export: SymbolExport) -> Self {
        self.symbol_exports.push(export);
        self
    }

    /// Sets the module's constructor.
    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Sets the module's destructor.
    #[must_use]
    pub fn destructor(mut self, destructor: DestructorFn) -> Self {
        self.destructor = Some(destructor);
        self
    }

    /// Finishes the record, leaking its backing `Vec`s to produce the
    /// `'static` slices a [`ModuleExport`] requires.
    ///
    /// # Panics
    /// Panics if `name`, `version`, `constructor`, or `destructor` was
    /// never set — these have no sensible default and a module export
    /// missing them is a build-time authoring bug, not a runtime error.
    #[must_use]
    pub fn build(self) -> ModuleExport {
        ModuleExport {
            name: self.name.expect("ModuleExportBuilder: name is required"),
            description: self.description,
            author: self.author,
            license: self.license,
            version: self.version.expect("ModuleExportBuilder: version is required"),
            parameters: Vec::leak(self.parameters),
            resources: Vec::leak(self.resources),
            namespace_imports: Vec::leak(self.namespace_imports),
            symbol_imports: Vec::leak(self.symbol_imports),
            symbol_exports: Vec::leak(self.symbol_exports),
            constructor: self.constructor.expect("ModuleExportBuilder: constructor is required"),
            destructor: self.destructor.expect("ModuleExportBuilder: destructor is required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parameter::{AccessClass, ParamValue};
    use crate::module::symbol::SymbolPtr;

    fn noop_ctor(_ctx: &ConstructionContext) -> Result<ModuleState, String> {
        Ok(Box::new(()))
    }
    fn noop_dtor(_state: ModuleState) {}

    #[test]
    fn builder_assembles_a_complete_export() {
        let export = ModuleExportBuilder::new("a")
            .version(Version::new(0, 1, 0))
            .description("test module")
            .parameter(ParameterDecl {
                name: "p",
                default: ParamValue::U32(1),
                read_class: AccessClass::Public,
                write_class: AccessClass::Private,
            })
            .export_symbol(SymbolExport {
                name: "a_export_0",
                namespace: "",
                version: Version::new(0, 1, 0),
                value: SymbolPtr::new(std::ptr::null()),
            })
            .constructor(noop_ctor)
            .destructor(noop_dtor)
            .build();
        assert_eq!(export.name, "a");
        assert_eq!(export.parameters.len(), 1);
        assert_eq!(export.symbol_exports.len(), 1);
    }

    #[test]
    #[should_panic(expected = "version is required")]
    fn builder_requires_version() {
        let _ = ModuleExportBuilder::new("a").constructor(noop_ctor).destructor(noop_dtor).build();
    }
}
