//! Service dependency graph
//!
//! A plain adjacency map over service names, built once per analysis run
//! from static configuration. Supports the two traversals classification
//! needs: transitive descendants (the services a node depends on) and
//! direct dependents (the services that depend on a node). Cyclic
//! configurations are valid input; traversal carries a visited set.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One service entry from static configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name
    pub name: String,
    /// Names of the services this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ServiceConfig {
    /// Create a service entry
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Directed service -> depends-on graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Build the graph from static service configuration
    ///
    /// Dependency names that never appear as a configured service are
    /// still added as nodes with no outgoing edges, so traversal does not
    /// fail on configuration gaps.
    #[must_use]
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let mut edges: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for service in services {
            let deps = edges.entry(service.name.clone()).or_default();
            deps.extend(service.dependencies.iter().cloned());
            for dep in &service.dependencies {
                edges.entry(dep.clone()).or_default();
            }
        }
        Self { edges }
    }

    /// Whether the graph knows this service
    #[inline]
    #[must_use]
    pub fn contains(&self, service: &str) -> bool {
        self.edges.contains_key(service)
    }

    /// All known service names, in configuration order
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All services transitively reachable via depends-on edges
    ///
    /// Breadth-first with a visited set; terminates on cycles. An unknown
    /// starting service yields the empty set.
    #[must_use]
    pub fn descendants(&self, service: &str) -> IndexSet<String> {
        let mut visited = IndexSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        if let Some(direct) = self.edges.get(service) {
            queue.extend(direct.iter().map(String::as_str));
        }
        while let Some(current) = queue.pop_front() {
            if current == service || !visited.insert(current.to_string()) {
                continue;
            }
            if let Some(next) = self.edges.get(current) {
                queue.extend(next.iter().map(String::as_str));
            }
        }
        visited
    }

    /// Services whose dependency list contains `service` (direct only)
    #[must_use]
    pub fn dependents(&self, service: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|(name, deps)| name.as_str() != service && deps.contains(service))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Adjacency snapshot for inclusion in reports
    #[must_use]
    pub fn to_map(&self) -> IndexMap<String, Vec<String>> {
        self.edges
            .iter()
            .map(|(name, deps)| (name.clone(), deps.iter().cloned().collect()))
            .collect()
    }
}
