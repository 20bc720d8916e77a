//! Per-module namespace inclusion tracking.
//!
//! A module includes a namespace either statically (declared in its
//! export record, immutable for its lifetime) or dynamically (via
//! `namespace_include`, reference-counted so nested includes/excludes
//! balance).

use std::collections::HashSet;

use hashbrown::HashMap;

use crate::error::{Error, Result};

/// Tracks which namespaces a single module includes.
#[derive(Debug, Default)]
pub(crate) struct NamespaceSet {
    r#static: HashSet<String>,
    dynamic: HashMap<String, u32>,
}

impl NamespaceSet {
    pub(crate) fn with_static(namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            r#static: namespaces.into_iter().collect(),
            dynamic: HashMap::new(),
        }
    }

    /// Returns `(included, is_static)`.
    pub(crate) fn included(&self, ns: &str) -> (bool, bool) {
        if self.r#static.contains(ns) {
            (true, true)
        } else {
            (self.dynamic.contains_key(ns), false)
        }
    }

    /// Idempotent: bumps the dynamic inclusion count for `ns`.
    pub(crate) fn include(&mut self, ns: &str) {
        *self.dynamic.entry(ns.to_owned()).or_insert(0) += 1;
    }

    /// Fails with [`crate::error::ErrorKind::Static`] if `ns` is a static
    /// inclusion; otherwise decrements the dynamic count, removing the
    /// entry once it reaches zero.
    pub(crate) fn exclude(&mut self, ns: &str) -> Result<()> {
        if self.r#static.contains(ns) {
            return Err(Error::static_edge().with_context(format!("namespace '{ns}' is statically included")));
        }
        match self.dynamic.get_mut(ns) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.dynamic.remove(ns);
                }
                Ok(())
            }
            None => Err(Error::not_found().with_context(format!("namespace '{ns}' is not included"))),
        }
    }
}
