//! Transactional staging area for a batch of module registrations.

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::module::export::ModuleExport;
use crate::module::info::ModuleInfo;
use crate::module::registry::Registry;

type OnSuccess = Box<dyn FnOnce(&ModuleInfo) + Send>;
type OnError = Box<dyn FnOnce() + Send>;

struct Staged {
    export: &'static ModuleExport,
    origin: Option<String>,
    on_success: Option<OnSuccess>,
    on_error: Option<OnError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetState {
    Open,
    Dismissed,
    Finished,
}

/// A mutable staging area collecting module export declarations together
/// with per-module callbacks, committed atomically by [`LoadingSet::finish`]
/// or discarded by [`LoadingSet::dismiss`].
pub struct LoadingSet {
    registry: std::sync::Arc<Registry>,
    staged: Mutex<Vec<Staged>>,
    state: Mutex<SetState>,
}

impl LoadingSet {
    pub(crate) fn new(registry: std::sync::Arc<Registry>) -> Self {
        Self {
            registry,
            staged: Mutex::new(Vec::new()),
            state: Mutex::new(SetState::Open),
        }
    }

    fn require_open(&self) -> Result<()> {
        if *self.state.lock() != SetState::Open {
            return Err(Error::busy().with_context("loading set is no longer open"));
        }
        Ok(())
    }

    /// Appends every export in `exports` for which `filter` returns `true`.
    /// Returns the number of exports appended.
    ///
    /// Takes an explicit candidate slice rather than scanning a shared
    /// object on disk: this crate does not read platform-specific linker
    /// sections (see [`crate::module::export`]), so the host assembles the
    /// candidate slice itself.
    pub fn append_modules(
        &self,
        exports: &[&'static ModuleExport],
        filter: impl Fn(&ModuleExport) -> bool,
    ) -> Result<usize> {
        self.require_open()?;
        let mut staged = self.staged.lock();
        let mut appended = 0;
        for export in exports {
            if filter(export) {
                staged.push(Staged {
                    export,
                    origin: None,
                    on_success: None,
                    on_error: None,
                });
                appended += 1;
            }
        }
        Ok(appended)
    }

    /// Appends a single export on behalf of `origin_module` (a host program
    /// or pseudo-module providing a module declaration outside the normal
    /// discovery path).
    pub fn append_freestanding_module(
        &self,
        origin_module: Option<&str>,
        export: &'static ModuleExport,
    ) -> Result<()> {
        self.require_open()?;
        self.staged.lock().push(Staged {
            export,
            origin: origin_module.map(str::to_owned),
            on_success: None,
            on_error: None,
        });
        Ok(())
    }

    /// Attaches success/error callbacks to the already-staged module named
    /// `name`.
    pub fn append_callback(
        &self,
        name: &str,
        on_success: impl FnOnce(&ModuleInfo) + Send + 'static,
        on_error: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        self.require_open()?;
        let mut staged = self.staged.lock();
        let entry = staged
            .iter_mut()
            .find(|s| s.export.name == name)
            .ok_or_else(|| Error::not_found().with_context(format!("module '{name}' is not staged")))?;
        entry.on_success = Some(Box::new(on_success));
        entry.on_error = Some(Box::new(on_error));
        Ok(())
    }

    /// Discards the set: no callbacks run, no module is published.
    pub fn dismiss(self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != SetState::Open {
            return Err(Error::busy().with_context("loading set is already dismissed or finished"));
        }
        *state = SetState::Dismissed;
        Ok(())
    }

    /// Commits the set: resolves static imports, computes a topological
    /// construction order, runs constructors in order, and rolls back
    /// every already-constructed module if any later one fails.
    pub fn finish(self) -> Result<Vec<ModuleInfo>> {
        {
            let mut state = self.state.lock();
            if *state != SetState::Open {
                return Err(Error::busy().with_context("loading set is already dismissed or finished"));
            }
            *state = SetState::Finished;
        }
        let staged = self.staged.into_inner();
        self.registry.commit(staged_into_inputs(staged))
    }
}

pub(crate) struct StagedInput {
    pub export: &'static ModuleExport,
    #[allow(dead_code)]
    pub origin: Option<String>,
    pub on_success: Option<OnSuccess>,
    pub on_error: Option<OnError>,
}

fn staged_into_inputs(staged: Vec<Staged>) -> Vec<StagedInput> {
    staged
        .into_iter()
        .map(|s| StagedInput {
            export: s.export,
            origin: s.origin,
            on_success: s.on_success,
            on_error: s.on_error,
        })
        .collect()
}
