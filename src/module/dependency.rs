//! Dependency-edge bookkeeping: static (declared, non-relinquishable) vs.
//! explicit (acquired, relinquishable) edges, and cycle detection.

use hashbrown::{HashMap, HashSet};

use crate::error::{Error, Result};

/// The outgoing edges of a single module.
#[derive(Debug, Default)]
pub(crate) struct DependencyEdges {
    r#static: HashSet<String>,
    explicit: HashMap<String, u32>,
}

impl DependencyEdges {
    pub(crate) fn with_static(targets: impl IntoIterator<Item = String>) -> Self {
        Self {
            r#static: targets.into_iter().collect(),
            explicit: HashMap::new(),
        }
    }

    /// Returns `(has_dependency, is_static)`.
    pub(crate) fn has_dependency(&self, target: &str) -> (bool, bool) {
        if self.r#static.contains(target) {
            (true, true)
        } else {
            (self.explicit.contains_key(target), false)
        }
    }

    pub(crate) fn acquire_explicit(&mut self, target: &str) {
        *self.explicit.entry(target.to_owned()).or_insert(0) += 1;
    }

    /// Fails with [`crate::error::ErrorKind::Static`] on a statically
    /// declared edge. Decrements the explicit count, removing the edge at
    /// zero.
    pub(crate) fn relinquish_explicit(&mut self, target: &str) -> Result<()> {
        if self.r#static.contains(target) {
            return Err(Error::static_edge().with_context(format!("dependency on '{target}' is static")));
        }
        match self.explicit.get_mut(target) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.explicit.remove(target);
                }
                Ok(())
            }
            None => Err(Error::not_found().with_context(format!("no acquired dependency on '{target}'"))),
        }
    }

    pub(crate) fn all_targets(&self) -> impl Iterator<Item = &str> {
        self.r#static.iter().chain(self.explicit.keys()).map(String::as_str)
    }
}

/// Returns `true` iff adding an edge `from -> to` would close a cycle,
/// i.e. `to` can already reach `from` over the existing edge set.
///
/// `edges_of` returns the current outgoing targets of a module name.
pub(crate) fn would_cycle<'a>(
    from: &str,
    to: &str,
    edges_of: impl Fn(&str) -> Box<dyn Iterator<Item = String> + 'a>,
) -> bool {
    if from == to {
        return true;
    }
    let mut stack = vec![to.to_owned()];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == from {
            return true;
        }
        if !seen.insert(node.clone()) {
            continue;
        }
        for next in edges_of(&node) {
            stack.push(next);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn static_edge_cannot_be_relinquished() {
        let mut edges = DependencyEdges::with_static(["b".to_owned()]);
        assert_eq!(edges.has_dependency("b"), (true, true));
        assert!(edges.relinquish_explicit("b").is_err());
    }

    #[test]
    fn explicit_edge_round_trips() {
        let mut edges = DependencyEdges::default();
        edges.acquire_explicit("b");
        assert_eq!(edges.has_dependency("b"), (true, false));
        edges.relinquish_explicit("b").unwrap();
        assert_eq!(edges.has_dependency("b"), (false, false));
    }

    #[test]
    fn detects_direct_cycle() {
        let mut graph: StdHashMap<String, Vec<String>> = StdHashMap::new();
        graph.insert("m1".into(), vec!["m2".into()]);
        let edges_of = |name: &str| -> Box<dyn Iterator<Item = String>> {
            Box::new(graph.get(name).cloned().unwrap_or_default().into_iter())
        };
        assert!(would_cycle("m2", "m1", edges_of));
    }

    #[test]
    fn no_cycle_for_independent_nodes() {
        let graph: StdHashMap<String, Vec<String>> = StdHashMap::new();
        let edges_of = |name: &str| -> Box<dyn Iterator<Item = String>> {
            Box::new(graph.get(name).cloned().unwrap_or_default().into_iter())
        };
        assert!(!would_cycle("m1", "m2", edges_of));
    }
}
