// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::validation::find_cycle;
use crate::errors::ValidationError;
use std::collections::{BTreeSet, HashMap};

/// Workflow name to the names it depends on, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`; re-registering replaces its dependencies but keeps its position.
    pub fn add_workflow(&mut self, name: impl Into<String>, dependencies: Vec<String>) {
        let name = name.into();
        if !self.dependencies.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.dependencies.insert(name, dependencies);
    }

    pub fn dependencies(&self, name: &str) -> Option<&Vec<String>> {
        self.dependencies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Orders workflows so every dependency precedes its dependents.
    ///
    /// Cycles are reported with their path before sorting. Among workflows
    /// that are ready at the same time, registration order wins. Dependencies
    /// on names outside the graph are ignored.
    pub fn topological_order(&self) -> Result<Vec<String>, ValidationError> {
        if let Some(cycle) = find_cycle(self) {
            return Err(ValidationError::CyclicDependency { cycle });
        }

        let index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.order.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.order.len()];
        for (i, name) in self.order.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for dep in self.dependencies.get(name).into_iter().flatten() {
                if let Some(&d) = index.get(dep.as_str()) {
                    if seen.insert(d) {
                        in_degree[i] += 1;
                        dependents[d].push(i);
                    }
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.order.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some(current) = ready.pop_first() {
            sorted.push(self.order[current].clone());
            for &dependent in &dependents[current] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted.len() != self.order.len() {
            let stuck = self
                .order
                .iter()
                .filter(|name| !sorted.contains(name))
                .cloned()
                .collect();
            return Err(ValidationError::CyclicDependency { cycle: stuck });
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (name, deps) in edges {
            graph.add_workflow(*name, deps.iter().map(|d| d.to_string()).collect());
        }
        graph
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let cases: Vec<Vec<(&str, &[&str])>> = vec![
            vec![("c", &["a", "b"]), ("a", &[]), ("b", &["a"])],
            vec![("final", &["mid"]), ("mid", &["base"]), ("base", &[])],
            vec![("x", &[]), ("y", &[]), ("z", &["x", "y"])],
        ];

        for edges in cases {
            let g = graph(&edges);
            let order = g.topological_order().unwrap();
            assert_eq!(order.len(), edges.len());
            for (name, deps) in &edges {
                for dep in deps.iter() {
                    assert!(position(&order, dep) < position(&order, name), "{:?}", order);
                }
            }
        }
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let g = graph(&[("b", &[]), ("a", &[]), ("c", &[])]);
        assert_eq!(g.topological_order().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        match g.topological_order() {
            Err(ValidationError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_external_dependencies_are_ignored() {
        let g = graph(&[("a", &["input"]), ("b", &["a"])]);
        assert_eq!(g.topological_order().unwrap(), vec!["a", "b"]);
    }
}
