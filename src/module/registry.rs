//! The process-wide module registry: the name map, the exported-symbol
//! table, and every operation that reads or mutates them.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::module::dependency::{would_cycle, DependencyEdges};
use crate::module::export::{ConstructionContext, ModuleExport, ModuleState};
use crate::module::info::ModuleInfo;
use crate::module::loading_set::{LoadingSet, StagedInput};
use crate::module::namespace::NamespaceSet;
use crate::module::parameter::{AccessClass, ParamValue, Parameter};
use crate::module::symbol::{LockCounter, SymbolExport, SymbolHandle, SymbolPtr};
use crate::version::Version;

/// The acquired strong handles an importer holds on one dependency target.
///
/// Acquiring the same dependency twice is rare (each `acquire_dependency`
/// call pushes one more handle, popped by the matching `relinquish`), so
/// this stays on the stack for the overwhelmingly common single-handle
/// case instead of allocating a `Vec`.
type DependencyRefs = SmallVec<[ModuleInfo; 1]>;

pub(crate) struct ModuleEntry {
    pub(crate) info: ModuleInfo,
    export: Option<&'static ModuleExport>,
    state: parking_lot::Mutex<Option<ModuleState>>,
    namespaces: parking_lot::Mutex<NamespaceSet>,
    dependencies: parking_lot::Mutex<DependencyEdges>,
    dependency_refs: parking_lot::Mutex<HashMap<String, DependencyRefs>>,
    parameters: HashMap<String, Parameter>,
    symbol_lock: Arc<LockCounter>,
}

struct SymbolRecord {
    owner: String,
    export: SymbolExport,
    value: SymbolPtr,
}

#[derive(Default)]
struct RegistryInner {
    modules: HashMap<String, Arc<ModuleEntry>>,
    symbols: HashMap<(String, String), SymbolRecord>,
    next_pseudo_id: u64,
}

/// Process-wide registry of loaded modules, their exported symbols, and
/// the dependency/namespace/parameter state attached to each.
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(RegistryInner::default()),
        })
    }

    /// Opens a new loading set bound to this registry.
    #[must_use]
    pub fn new_loading_set(self: &Arc<Self>) -> LoadingSet {
        LoadingSet::new(Arc::clone(self))
    }

    /// Looks up a loaded module by name, returning a freshly acquired
    /// strong handle.
    pub fn find_by_name(&self, name: &str) -> Result<ModuleInfo> {
        let inner = self.inner.read();
        inner
            .modules
            .get(name)
            .map(|entry| entry.info.acquire())
            .ok_or_else(|| Error::not_found().with_context(format!("module '{name}' is not loaded")))
    }

    /// Looks up the module that exports `(namespace, name)`.
    pub fn find_by_symbol(&self, namespace: &str, name: &str) -> Result<ModuleInfo> {
        let inner = self.inner.read();
        let record = inner
            .symbols
            .get(&(namespace.to_owned(), name.to_owned()))
            .ok_or_else(|| Error::not_found().with_context(format!("symbol '{namespace}::{name}' is not exported")))?;
        Ok(inner.modules[&record.owner].info.acquire())
    }

    /// Resolves and locks a symbol on behalf of `importer`.
    ///
    /// Succeeds iff `importer` includes `namespace`, the exporter is a
    /// dependency of `importer`, and the export is version-compatible with
    /// `required`.
    pub fn load_symbol(
        &self,
        importer: &str,
        name: &str,
        namespace: &str,
        required: Version,
    ) -> Result<SymbolHandle> {
        let inner = self.inner.read();
        let importer_entry = inner
            .modules
            .get(importer)
            .ok_or_else(|| Error::not_found().with_context(format!("importer '{importer}' is not loaded")))?;
        let (included, _) = importer_entry.namespaces.lock().included(namespace);
        if !included {
            return Err(Error::forbidden().with_context(format!("'{importer}' does not include namespace '{namespace}'")));
        }
        let record = inner
            .symbols
            .get(&(namespace.to_owned(), name.to_owned()))
            .ok_or_else(|| Error::not_found().with_context(format!("symbol '{namespace}::{name}' is not exported")))?;
        let (has_dep, _) = importer_entry.dependencies.lock().has_dependency(&record.owner);
        if !has_dep {
            return Err(Error::forbidden().with_context(format!("'{importer}' has no dependency on '{}'", record.owner)));
        }
        if !record.export.version.is_compatible_with(&required) {
            return Err(Error::version_mismatch().with_context(format!(
                "symbol '{namespace}::{name}' exported at {} is incompatible with required {required}",
                record.export.version
            )));
        }
        let exporter = &inner.modules[&record.owner];
        Ok(SymbolHandle::new(
            record.export,
            record.value,
            exporter.info.acquire(),
            Arc::clone(&exporter.symbol_lock),
        ))
    }

    /// Idempotently includes `namespace` on `module` (dynamic inclusion).
    pub fn namespace_include(&self, module: &str, namespace: &str) -> Result<()> {
        let inner = self.inner.read();
        let entry = inner
            .modules
            .get(module)
            .ok_or_else(|| Error::not_found().with_context(format!("module '{module}' is not loaded")))?;
        entry.namespaces.lock().include(namespace);
        Ok(())
    }

    /// Excludes `namespace` from `module`. Fails with
    /// [`crate::error::ErrorKind::Static`] if the inclusion is declared.
    pub fn namespace_exclude(&self, module: &str, namespace: &str) -> Result<()> {
        let inner = self.inner.read();
        let entry = inner
            .modules
            .get(module)
            .ok_or_else(|| Error::not_found().with_context(format!("module '{module}' is not loaded")))?;
        entry.namespaces.lock().exclude(namespace)
    }

    /// Returns `(included, is_static)` for `namespace` on `module`.
    pub fn namespace_included(&self, module: &str, namespace: &str) -> Result<(bool, bool)> {
        let inner = self.inner.read();
        let entry = inner
            .modules
            .get(module)
            .ok_or_else(|| Error::not_found().with_context(format!("module '{module}' is not loaded")))?;
        Ok(entry.namespaces.lock().included(namespace))
    }

    /// Adds an explicit dependency edge `importer -> target`, refusing to
    /// introduce a cycle, and increments `target`'s strong reference.
    pub fn acquire_dependency(&self, importer: &str, target: &str) -> Result<()> {
        let inner = self.inner.write();
        if !inner.modules.contains_key(importer) {
            return Err(Error::not_found().with_context(format!("importer '{importer}' is not loaded")));
        }
        if !inner.modules.contains_key(target) {
            return Err(Error::not_found().with_context(format!("target '{target}' is not loaded")));
        }
        let edges_of = |name: &str| -> Box<dyn Iterator<Item = String>> {
            match inner.modules.get(name) {
                Some(entry) => Box::new(
                    entry
                        .dependencies
                        .lock()
                        .all_targets()
                        .map(str::to_owned)
                        .collect::<Vec<_>>()
                        .into_iter(),
                ),
                None => Box::new(std::iter::empty()),
            }
        };
        if would_cycle(importer, target, edges_of) {
            return Err(Error::cycle().with_context(format!("'{importer}' -> '{target}' would close a cycle")));
        }
        let target_entry = &inner.modules[target];
        let acquired = target_entry.info.acquire();
        let importer_entry = &inner.modules[importer];
        importer_entry.dependencies.lock().acquire_explicit(target);
        importer_entry
            .dependency_refs
            .lock()
            .entry(target.to_owned())
            .or_default()
            .push(acquired);
        Ok(())
    }

    /// Removes an explicit dependency edge, decrementing `target`'s
    /// strong reference. Fails with
    /// [`crate::error::ErrorKind::Static`] on a declared edge.
    pub fn relinquish_dependency(&self, importer: &str, target: &str) -> Result<()> {
        let inner = self.inner.read();
        let importer_entry = inner
            .modules
            .get(importer)
            .ok_or_else(|| Error::not_found().with_context(format!("importer '{importer}' is not loaded")))?;
        importer_entry.dependencies.lock().relinquish_explicit(target)?;
        let mut refs = importer_entry.dependency_refs.lock();
        if let Some(stack) = refs.get_mut(target) {
            stack.pop();
            if stack.is_empty() {
                refs.remove(target);
            }
        }
        Ok(())
    }

    /// Returns `(has_dependency, is_static)` for `importer -> target`.
    pub fn has_dependency(&self, importer: &str, target: &str) -> Result<(bool, bool)> {
        let inner = self.inner.read();
        let entry = inner
            .modules
            .get(importer)
            .ok_or_else(|| Error::not_found().with_context(format!("importer '{importer}' is not loaded")))?;
        Ok(entry.dependencies.lock().has_dependency(target))
    }

    fn param<'a>(inner: &'a RegistryInner, owner: &str, name: &str) -> Result<&'a Parameter> {
        inner
            .modules
            .get(owner)
            .ok_or_else(|| Error::not_found().with_context(format!("module '{owner}' is not loaded")))?
            .parameters
            .get(name)
            .ok_or_else(|| Error::not_found().with_context(format!("parameter '{name}' is not declared on '{owner}'")))
    }

    /// Reads a parameter as any caller via the context-level API.
    pub fn param_get_public(&self, owner: &str, name: &str) -> Result<ParamValue> {
        Self::param(&self.inner.read(), owner, name)?.get(AccessClass::Public)
    }

    /// Writes a parameter as any caller via the context-level API.
    pub fn param_set_public(&self, owner: &str, name: &str, value: ParamValue) -> Result<()> {
        Self::param(&self.inner.read(), owner, name)?.set(AccessClass::Public, value)
    }

    /// Reads a parameter on behalf of `caller`, which must hold a
    /// dependency on `owner`.
    pub fn param_get_dependency(&self, caller: &str, owner: &str, name: &str) -> Result<ParamValue> {
        let inner = self.inner.read();
        let (has_dep, _) = inner
            .modules
            .get(caller)
            .ok_or_else(|| Error::not_found().with_context(format!("caller '{caller}' is not loaded")))?
            .dependencies
            .lock()
            .has_dependency(owner);
        if !has_dep {
            return Err(Error::forbidden().with_context(format!("'{caller}' has no dependency on '{owner}'")));
        }
        Self::param(&inner, owner, name)?.get(AccessClass::Dependency)
    }

    /// Writes a parameter on behalf of `caller`, which must hold a
    /// dependency on `owner`.
    pub fn param_set_dependency(&self, caller: &str, owner: &str, name: &str, value: ParamValue) -> Result<()> {
        let inner = self.inner.read();
        let (has_dep, _) = inner
            .modules
            .get(caller)
            .ok_or_else(|| Error::not_found().with_context(format!("caller '{caller}' is not loaded")))?
            .dependencies
            .lock()
            .has_dependency(owner);
        if !has_dep {
            return Err(Error::forbidden().with_context(format!("'{caller}' has no dependency on '{owner}'")));
        }
        Self::param(&inner, owner, name)?.set(AccessClass::Dependency, value)
    }

    /// Reads a parameter as its own owning module.
    pub fn param_get_private(&self, caller: &str, owner: &str, name: &str) -> Result<ParamValue> {
        if caller != owner {
            return Err(Error::forbidden().with_context("private parameter access requires caller == owner"));
        }
        Self::param(&self.inner.read(), owner, name)?.get(AccessClass::Private)
    }

    /// Writes a parameter as its own owning module.
    pub fn param_set_private(&self, caller: &str, owner: &str, name: &str, value: ParamValue) -> Result<()> {
        if caller != owner {
            return Err(Error::forbidden().with_context("private parameter access requires caller == owner"));
        }
        Self::param(&self.inner.read(), owner, name)?.set(AccessClass::Private, value)
    }

    /// Unloads `info`'s module. Valid only when the registry is the only
    /// remaining strong holder and no symbol locks are outstanding.
    pub fn unload(&self, info: &ModuleInfo) -> Result<()> {
        self.unload_by_name(info.name())
    }

    /// Unloads the module named `name` by its registry key rather than a
    /// live handle, so a caller that has already dropped its last
    /// [`ModuleInfo`] (e.g. [`crate::context::PseudoModule::destroy`]) does
    /// not need to re-acquire one just to name the target.
    pub fn unload_by_name(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let name = name.to_owned();
        {
            let entry = inner
                .modules
                .get(&name)
                .ok_or_else(|| Error::not_found().with_context(format!("module '{name}' is not loaded")))?;
            if entry.info.strong_count() != 1 {
                return Err(Error::busy().with_context("module has outstanding strong references"));
            }
            if entry.symbol_lock.is_locked() {
                return Err(Error::busy().with_context("module has outstanding symbol locks"));
            }
            entry.info.lock_unload();
            let state = entry
                .state
                .lock()
                .take()
                .expect("unload: module constructed without state");
            if let Some(export) = entry.export {
                (export.destructor)(state);
            }
            entry.dependency_refs.lock().clear();
            if let Some(export) = entry.export {
                for exp in export.symbol_exports {
                    inner
                        .symbols
                        .remove(&(exp.namespace.to_owned(), exp.name.to_owned()));
                }
            }
            inner
                .symbols
                .retain(|_, record| record.owner != name);
        }
        let entry = inner.modules.remove(&name).expect("checked above");
        entry.info.unlock_unload();
        drop(entry);
        Ok(())
    }

    pub(crate) fn commit(&self, staged: Vec<StagedInput>) -> Result<Vec<ModuleInfo>> {
        let mut inner = self.inner.write();

        let mut seen_names: HashSet<&str> = HashSet::new();
        for s in &staged {
            if !seen_names.insert(s.export.name) {
                return Err(rollback_and_fail(staged, Error::already_exists()
                    .with_context(format!("module '{}' is staged twice", s.export.name))));
            }
            if inner.modules.contains_key(s.export.name) {
                return Err(rollback_and_fail(staged, Error::already_exists()
                    .with_context(format!("module '{}' is already loaded", s.export.name))));
            }
        }

        let index_of: HashMap<&str, usize> =
            staged.iter().enumerate().map(|(i, s)| (s.export.name, i)).collect();

        let mut staged_symbols: HashMap<(&str, &str), &str> = HashMap::new();
        for s in &staged {
            for exp in s.export.symbol_exports {
                let key = (exp.namespace, exp.name);
                let already_registered = inner
                    .symbols
                    .contains_key(&(exp.namespace.to_owned(), exp.name.to_owned()));
                if staged_symbols.contains_key(&key) || already_registered {
                    return Err(rollback_and_fail(
                        staged,
                        Error::already_exists()
                            .with_context(format!("symbol '{}::{}' is already exported", exp.namespace, exp.name)),
                    ));
                }
                staged_symbols.insert(key, s.export.name);
            }
        }

        let mut static_deps: Vec<HashSet<String>> = vec![HashSet::new(); staged.len()];
        for (i, s) in staged.iter().enumerate() {
            for imp in s.export.symbol_imports {
                let key = (imp.namespace, imp.name);
                let (owner, export_version) = if let Some(owner) = staged_symbols.get(&key) {
                    let owner_export = staged[index_of[owner]].export;
                    let version = owner_export
                        .symbol_exports
                        .iter()
                        .find(|e| e.namespace == imp.namespace && e.name == imp.name)
                        .map(|e| e.version)
                        .expect("staged_symbols entry implies a matching export");
                    ((*owner).to_owned(), version)
                } else if let Some(record) = inner
                    .symbols
                    .get(&(imp.namespace.to_owned(), imp.name.to_owned()))
                {
                    (record.owner.clone(), record.export.version)
                } else {
                    return Err(rollback_and_fail(
                        staged,
                        Error::unresolved()
                            .with_context(format!("'{}' requires '{}::{}'", s.export.name, imp.namespace, imp.name)),
                    ));
                };
                if !export_version.is_compatible_with(&imp.required) {
                    return Err(rollback_and_fail(
                        staged,
                        Error::unresolved().with_context(format!(
                            "'{}::{}' exported at {export_version} is incompatible with required {}",
                            imp.namespace, imp.name, imp.required
                        )),
                    ));
                }
                static_deps[i].insert(owner);
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); staged.len()];
        let mut in_degree = vec![0u32; staged.len()];
        for (i, deps) in static_deps.iter().enumerate() {
            for dep in deps {
                if let Some(&j) = index_of.get(dep.as_str()) {
                    dependents[j].push(i);
                    in_degree[i] += 1;
                }
            }
        }
        let mut queue: std::collections::VecDeque<usize> =
            (0..staged.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(staged.len());
        while let Some(j) = queue.pop_front() {
            order.push(j);
            for &i in &dependents[j] {
                in_degree[i] -= 1;
                if in_degree[i] == 0 {
                    queue.push_back(i);
                }
            }
        }
        if order.len() != staged.len() {
            return Err(rollback_and_fail(staged, Error::cycle().with_context("dependency cycle among staged modules")));
        }

        let mut staged = staged;
        let mut constructed: Vec<(usize, ModuleState, Vec<SymbolExport>)> = Vec::new();
        for &i in &order {
            let export = staged[i].export;
            let ctx = ConstructionContext::new(export.name);
            match (export.constructor)(&ctx) {
                Ok(state) => constructed.push((i, state, ctx.into_dynamic_exports())),
                Err(message) => {
                    for (j, state, _) in constructed.into_iter().rev() {
                        (staged[j].export.destructor)(state);
                        if let Some(cb) = staged[j].on_error.take() {
                            cb();
                        }
                    }
                    if let Some(cb) = staged[i].on_error.take() {
                        cb();
                    }
                    return Err(Error::internal()
                        .with_context(format!("constructor for '{}' failed: {message}", export.name)));
                }
            }
        }

        let mut published = Vec::with_capacity(constructed.len());
        for (i, state, dynamic_exports) in constructed {
            let export = staged[i].export;
            let mut parameters = HashMap::new();
            for decl in export.parameters {
                parameters.insert(decl.name.to_owned(), Parameter::new(decl));
            }
            let namespaces =
                NamespaceSet::with_static(export.namespace_imports.iter().map(|n| (*n).to_owned()));
            let dependencies = DependencyEdges::with_static(static_deps[i].iter().cloned());

            let info = ModuleInfo::new(export.name.to_owned(), export.version);
            let returned_handle = info.acquire();

            let mut dependency_refs: HashMap<String, DependencyRefs> = HashMap::new();
            for target in &static_deps[i] {
                let acquired = if let Some(&j) = index_of.get(target.as_str()) {
                    // Resolved to a module staged (and already published)
                    // earlier in `order`; look it up by name instead.
                    inner.modules.get(target).map(|e| e.info.acquire()).unwrap_or_else(|| {
                        panic!("staged dependency '{target}' (index {j}) was not published before its dependent")
                    })
                } else {
                    inner.modules[target].info.acquire()
                };
                dependency_refs.entry(target.clone()).or_default().push(acquired);
            }

            let entry = Arc::new(ModuleEntry {
                info,
                export: Some(export),
                state: parking_lot::Mutex::new(Some(state)),
                namespaces: parking_lot::Mutex::new(namespaces),
                dependencies: parking_lot::Mutex::new(dependencies),
                dependency_refs: parking_lot::Mutex::new(dependency_refs),
                parameters,
                symbol_lock: Arc::new(LockCounter::new()),
            });

            for exp in export.symbol_exports {
                inner.symbols.insert(
                    (exp.namespace.to_owned(), exp.name.to_owned()),
                    SymbolRecord {
                        owner: export.name.to_owned(),
                        export: *exp,
                        value: exp.value,
                    },
                );
            }
            for exp in dynamic_exports {
                inner
                    .symbols
                    .insert((exp.namespace.to_owned(), exp.name.to_owned()), SymbolRecord {
                        owner: export.name.to_owned(),
                        export: exp,
                        value: exp.value,
                    });
            }

            inner.modules.insert(export.name.to_owned(), entry);
            published.push((i, returned_handle));
        }

        let mut infos = Vec::with_capacity(published.len());
        for (i, handle) in published {
            if let Some(cb) = staged[i].on_success.take() {
                cb(&handle);
            }
            infos.push(handle);
        }
        Ok(infos)
    }

    /// Creates a pseudo-module: a host-created participant in the
    /// dependency/symbol graph with no declared parameters, resources,
    /// exports, or constructor.
    pub(crate) fn new_pseudo_module(&self) -> ModuleInfo {
        let mut inner = self.inner.write();
        let id = inner.next_pseudo_id;
        inner.next_pseudo_id += 1;
        let name = format!("__pseudo_{id}");
        let info = ModuleInfo::new(name.clone(), Version::new(0, 0, 0));
        let handle = info.acquire();
        let entry = Arc::new(ModuleEntry {
            info,
            export: None,
            state: parking_lot::Mutex::new(Some(Box::new(()))),
            namespaces: parking_lot::Mutex::new(NamespaceSet::default()),
            dependencies: parking_lot::Mutex::new(DependencyEdges::default()),
            dependency_refs: parking_lot::Mutex::new(HashMap::new()),
            parameters: HashMap::new(),
            symbol_lock: Arc::new(LockCounter::new()),
        });
        inner.modules.insert(name, entry);
        handle
    }
}

fn rollback_and_fail(mut staged: Vec<StagedInput>, err: Error) -> Error {
    for s in &mut staged {
        if let Some(cb) = s.on_error.take() {
            cb();
        }
    }
    err
}
