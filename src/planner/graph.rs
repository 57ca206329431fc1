//! Dependency graph between stacks.
//!
//! Edges point from a dependency to its dependent. The graph is acyclic at
//! all times: an edge that would close a cycle is rejected before anything
//! is changed.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::GraphError;

/// Directed acyclic graph of stack names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackGraph {
    /// node -> nodes that depend on it
    successors: BTreeMap<String, BTreeSet<String>>,
    /// node -> nodes it depends on
    predecessors: BTreeMap<String, BTreeSet<String>>,
}

impl StackGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `(name, dependencies)` pairs.
    ///
    /// Self-dependencies are ignored.
    ///
    /// # Errors
    ///
    /// Returns `DependencyDoesNotExist` for a dependency on an unknown name
    /// and `CircularDependency` if the declarations contain a cycle.
    pub fn build<'a, I, D>(units: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let units: Vec<(&str, Vec<&str>)> = units
            .into_iter()
            .map(|(name, deps)| (name, deps.into_iter().collect()))
            .collect();

        let mut graph = Self::new();
        for (name, _) in &units {
            graph.add_node(name);
        }

        for (name, deps) in &units {
            for dep in deps {
                if !graph.contains(dep) {
                    return Err(GraphError::DependencyDoesNotExist {
                        stack: (*name).to_string(),
                        dependency: (*dep).to_string(),
                    });
                }
                graph.add_edge(dep, name)?;
            }
        }

        Ok(graph)
    }

    /// Adds a node if it is not present yet.
    pub fn add_node(&mut self, name: &str) {
        self.successors.entry(name.to_string()).or_default();
        self.predecessors.entry(name.to_string()).or_default();
    }

    /// Adds the edge `dependency -> dependent`.
    ///
    /// A self edge is discarded.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStack` if either node is missing and
    /// `CircularDependency` if the edge would close a cycle. The graph is
    /// left untouched on error.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) -> Result<(), GraphError> {
        for name in [dependency, dependent] {
            if !self.contains(name) {
                return Err(GraphError::UnknownStack {
                    name: name.to_string(),
                });
            }
        }
        if dependency == dependent {
            return Ok(());
        }

        if self.reaches(dependent, dependency) {
            return Err(GraphError::CircularDependency {
                from: dependency.to_string(),
                to: dependent.to_string(),
            });
        }

        if let Some(next) = self.successors.get_mut(dependency) {
            next.insert(dependent.to_string());
        }
        if let Some(prev) = self.predecessors.get_mut(dependent) {
            prev.insert(dependency.to_string());
        }
        Ok(())
    }

    /// Returns true if `name` is a node.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.successors.contains_key(name)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Node names in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.successors.keys().map(String::as_str)
    }

    /// Direct predecessors of `name`, i.e. what must finish before it.
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.predecessors
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Topological layering; ties inside a layer are in ascending name order.
    ///
    /// An empty graph yields a single empty layer.
    #[must_use]
    pub fn layers(&self) -> Vec<Vec<String>> {
        if self.is_empty() {
            return vec![Vec::new()];
        }

        let mut in_degree: BTreeMap<&str, usize> = self
            .predecessors
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut layers = Vec::new();
        let mut current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        while !current.is_empty() {
            let mut next = BTreeSet::new();
            for name in &current {
                in_degree.remove(name);
                for dependent in self.successors.get(*name).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.insert(dependent.as_str());
                        }
                    }
                }
            }
            layers.push(current.iter().map(|s| (*s).to_string()).collect());
            current = next.into_iter().collect();
        }

        layers
    }

    /// Returns a copy with every edge flipped.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self {
            successors: self.predecessors.clone(),
            predecessors: self.successors.clone(),
        }
    }

    /// Removes a node and its incident edges.
    pub fn remove(&mut self, name: &str) {
        if let Some(next) = self.successors.remove(name) {
            for dependent in next {
                if let Some(prev) = self.predecessors.get_mut(&dependent) {
                    prev.remove(name);
                }
            }
        }
        if let Some(prev) = self.predecessors.remove(name) {
            for dependency in prev {
                if let Some(next) = self.successors.get_mut(&dependency) {
                    next.remove(name);
                }
            }
        }
    }

    /// All nodes `name` transitively depends on.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependencies_of(name).collect();
        while let Some(current) = stack.pop() {
            if seen.insert(current.to_string()) {
                stack.extend(self.dependencies_of(current));
            }
        }
        seen
    }

    /// Narrows the graph to `targets` plus everything they transitively
    /// depend on.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStack` for a target that is not a node.
    pub fn restrict_to<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, GraphError> {
        let mut keep = BTreeSet::new();
        for target in targets {
            if !self.contains(target) {
                return Err(GraphError::UnknownStack {
                    name: target.to_string(),
                });
            }
            keep.insert(target.to_string());
            keep.extend(self.ancestors(target));
        }

        let mut narrowed = self.clone();
        let drop: Vec<String> = self
            .nodes()
            .filter(|name| !keep.contains(*name))
            .map(str::to_string)
            .collect();
        for name in drop {
            narrowed.remove(&name);
        }
        Ok(narrowed)
    }

    /// Returns true if `to` is reachable from `from` along edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if seen.insert(current) {
                stack.extend(
                    self.successors
                        .get(current)
                        .into_iter()
                        .flatten()
                        .map(String::as_str),
                );
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(units: &[(&'static str, &[&'static str])]) -> Result<StackGraph, GraphError> {
        StackGraph::build(units.iter().map(|(name, deps)| (*name, deps.iter().copied())))
    }

    #[test]
    fn test_empty_graph_has_one_empty_layer() {
        let g = graph(&[]).expect("build failed");
        assert!(g.is_empty());
        assert_eq!(g.layers(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_layers_respect_dependencies() {
        let g = graph(&[
            ("app", &["db", "vpc"]),
            ("db", &["vpc"]),
            ("vpc", &[]),
            ("dns", &[]),
            ("cdn", &["app", "dns"]),
        ])
        .expect("build failed");

        let layers = g.layers();
        assert_eq!(
            layers,
            vec![
                vec!["dns".to_string(), "vpc".to_string()],
                vec!["db".to_string()],
                vec!["app".to_string()],
                vec!["cdn".to_string()],
            ]
        );

        // Every node appears once, after all of its dependencies.
        let position = |name: &str| {
            layers
                .iter()
                .position(|layer| layer.iter().any(|n| n == name))
                .expect("node in a layer")
        };
        for name in g.nodes() {
            for dep in g.dependencies_of(name) {
                assert!(position(dep) < position(name));
            }
        }
        assert_eq!(layers.iter().map(Vec::len).sum::<usize>(), g.len());
    }

    #[test]
    fn test_self_dependency_is_ignored() {
        let g = graph(&[("vpc", &["vpc"])]).expect("build failed");
        assert_eq!(g.layers(), vec![vec!["vpc".to_string()]]);
    }

    #[test]
    fn test_cycle_is_rejected_without_mutation() {
        let mut g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]).expect("build failed");
        let before = g.clone();

        let err = g.add_edge("c", "a").expect_err("cycle must be rejected");
        assert!(matches!(
            err,
            GraphError::CircularDependency { ref from, ref to } if from == "c" && to == "a"
        ));
        assert_eq!(g, before);
    }

    #[test]
    fn test_cycle_in_declarations() {
        let err = graph(&[("a", &["b"]), ("b", &["a"])]).expect_err("cycle");
        assert!(matches!(err, GraphError::CircularDependency { .. }));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = graph(&[("app", &["ghost"])]).expect_err("unknown dependency");
        assert!(matches!(err, GraphError::DependencyDoesNotExist { .. }));
    }

    #[test]
    fn test_reverse_flips_layers() {
        let g = graph(&[("vpc", &[]), ("db", &["vpc"]), ("app", &["db"])]).expect("build failed");
        assert_eq!(
            g.reverse().layers(),
            vec![
                vec!["app".to_string()],
                vec!["db".to_string()],
                vec!["vpc".to_string()]
            ]
        );
    }

    #[test]
    fn test_restrict_keeps_transitive_dependencies() {
        let g = graph(&[
            ("vpc", &[]),
            ("db", &["vpc"]),
            ("app", &["db"]),
            ("dns", &[]),
        ])
        .expect("build failed");

        let narrowed = g.restrict_to(["app"]).expect("restrict failed");
        assert_eq!(narrowed.nodes().collect::<Vec<_>>(), vec!["app", "db", "vpc"]);
        assert!(g.restrict_to(["ghost"]).is_err());
    }

    #[test]
    fn test_remove_drops_incident_edges() {
        let mut g = graph(&[("vpc", &[]), ("db", &["vpc"])]).expect("build failed");
        g.remove("vpc");
        assert_eq!(g.dependencies_of("db").count(), 0);
        assert_eq!(g.layers(), vec![vec!["db".to_string()]]);
    }
}
