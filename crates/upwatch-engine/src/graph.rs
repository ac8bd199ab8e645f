//! Service dependency graph.
//!
//! Edges `(dependent -> dependency)` are held as a flat list; traversal is
//! breadth-first with each node visited once. The cycle check runs before
//! an edge is persisted, so the stored graph never contains a loop.

use crate::error::{EngineError, Result};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use upwatch_common::types::ServiceDependency;
use upwatch_store::Store;

/// True when adding `(dependent -> dependency)` would close a loop:
/// either the two ends are the same service, or `dependent` is already
/// reachable from `dependency` through the dependency direction.
pub fn would_create_cycle(
    edges: &[ServiceDependency],
    dependent: &str,
    dependency: &str,
) -> bool {
    if dependent == dependency {
        return true;
    }
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(dependency);
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        for edge in edges.iter().filter(|e| e.dependent_service_id == node) {
            let next = edge.dependency_service_id.as_str();
            if next == dependent {
                return true;
            }
            queue.push_back(next);
        }
    }
    false
}

/// Every service `service_id` transitively depends on.
pub fn transitive_dependencies(edges: &[ServiceDependency], service_id: &str) -> Vec<String> {
    traverse(edges, service_id, Direction::Dependencies)
}

/// Every service transitively depending on `service_id`.
pub fn transitive_dependents(edges: &[ServiceDependency], service_id: &str) -> Vec<String> {
    traverse(edges, service_id, Direction::Dependents)
}

enum Direction {
    Dependencies,
    Dependents,
}

fn traverse(edges: &[ServiceDependency], start: &str, direction: Direction) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut reached = Vec::new();
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        for edge in edges {
            let next = match direction {
                Direction::Dependencies if edge.dependent_service_id == node => {
                    edge.dependency_service_id.as_str()
                }
                Direction::Dependents if edge.dependency_service_id == node => {
                    edge.dependent_service_id.as_str()
                }
                _ => continue,
            };
            if !visited.contains(next) {
                reached.push(next.to_string());
                queue.push_back(next);
            }
        }
    }
    reached.sort();
    reached.dedup();
    reached
}

/// Store-backed wrapper enforcing the cycle invariant on insertion.
pub struct DependencyGraph {
    store: Arc<dyn Store>,
}

impl DependencyGraph {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validates against the current edge set and persists the edge.
    /// Rejected edges are never partially applied.
    pub async fn add_dependency(
        &self,
        dependent_service_id: &str,
        dependency_service_id: &str,
    ) -> Result<ServiceDependency> {
        let edges = self.store.list_dependencies().await?;
        if would_create_cycle(&edges, dependent_service_id, dependency_service_id) {
            return Err(EngineError::CycleDetected {
                dependent: dependent_service_id.to_string(),
                dependency: dependency_service_id.to_string(),
            });
        }
        let now = Utc::now();
        let edge = ServiceDependency {
            id: upwatch_common::id::next_id(),
            dependent_service_id: dependent_service_id.to_string(),
            dependency_service_id: dependency_service_id.to_string(),
            created_at: now,
        };
        self.store.add_dependency(edge.clone()).await?;
        Ok(edge)
    }

    pub async fn dependencies_of(&self, service_id: &str) -> Result<Vec<String>> {
        let edges = self.store.list_dependencies().await?;
        Ok(transitive_dependencies(&edges, service_id))
    }

    pub async fn dependents_of(&self, service_id: &str) -> Result<Vec<String>> {
        let edges = self.store.list_dependencies().await?;
        Ok(transitive_dependents(&edges, service_id))
    }
}
