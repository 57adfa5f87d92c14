//! ABOUTME: DependencyGraph - builds, validates and orders a workflow's
//! ABOUTME: resources by their Requires edges

use graphflow_core::error::{bad_request_error, dependency_failed_error, not_found_error, Result};
use graphflow_core::types::{ActionId, Resource};
use std::collections::{BTreeSet, HashMap, HashSet};

struct Node {
    resource: Resource,
    dependents: HashSet<ActionId>,
}

/// `Nodes: mapping ActionID -> Node{ActionID, Resource, Dependents}`, with
/// edges implied by each resource's `Requires` set. `build()` populates
/// `dependents` from the reverse edges and must run before any ordering
/// query.
#[derive(Default)]
pub struct DependencyGraph {
    nodes: HashMap<ActionId, Node>,
    built: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a duplicate `ActionID`.
    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        let action_id = resource.action_id().clone();
        if self.nodes.contains_key(&action_id) {
            return Err(bad_request_error(format!("duplicate resource action id '{action_id}'")));
        }
        self.nodes.insert(
            action_id,
            Node {
                resource,
                dependents: HashSet::new(),
            },
        );
        self.built = false;
        Ok(())
    }

    /// Populates every node's `dependents` list from the reverse edges of
    /// `Requires`. Errors if any `Requires` entry names a missing node.
    pub fn build(&mut self) -> Result<()> {
        for node in self.nodes.values() {
            for dep in &node.resource.metadata.requires {
                if !self.nodes.contains_key(dep) {
                    return Err(not_found_error(format!(
                        "resource '{}' requires unknown action id '{dep}'",
                        node.resource.action_id()
                    )));
                }
            }
        }
        let edges: Vec<(ActionId, ActionId)> = self
            .nodes
            .values()
            .flat_map(|n| {
                let id = n.resource.action_id().clone();
                n.resource.metadata.requires.iter().cloned().map(move |dep| (dep, id.clone()))
            })
            .collect();
        for (dep, dependent) in edges {
            self.nodes.get_mut(&dep).unwrap().dependents.insert(dependent);
        }
        self.detect_cycles()?;
        self.built = true;
        Ok(())
    }

    /// DFS with white/gray/black coloring over `Requires` edges. A
    /// self-requirement is a one-node cycle.
    pub fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: HashMap<&ActionId, Color> = self.nodes.keys().map(|id| (id, Color::White)).collect();
        let mut order: Vec<&ActionId> = self.nodes.keys().collect();
        order.sort();

        fn visit<'a>(
            id: &'a ActionId,
            nodes: &'a HashMap<ActionId, Node>,
            color: &mut HashMap<&'a ActionId, Color>,
        ) -> Result<()> {
            if nodes[id].resource.metadata.requires.contains(id) {
                return Err(dependency_failed_error(format!("cycle detected: '{id}' requires itself")));
            }
            color.insert(id, Color::Gray);
            let mut deps: Vec<&ActionId> = nodes[id].resource.metadata.requires.iter().collect();
            deps.sort();
            for dep in deps {
                match color.get(dep).copied().unwrap_or(Color::White) {
                    Color::White => visit(dep, nodes, color)?,
                    Color::Gray => {
                        return Err(dependency_failed_error(format!(
                            "cycle detected: '{id}' reaches '{dep}' which is already on the current path"
                        )))
                    }
                    Color::Black => {}
                }
            }
            color.insert(id, Color::Black);
            Ok(())
        }

        for id in order {
            if color[id] == Color::White {
                visit(id, &self.nodes, &mut color)?;
            }
        }
        Ok(())
    }

    /// A linear order consistent with `Requires`; ties are broken by
    /// `ActionID` ordering so the result is deterministic within a run.
    pub fn topological_sort(&self) -> Result<Vec<ActionId>> {
        let mut indegree: HashMap<&ActionId, usize> = self
            .nodes
            .iter()
            .map(|(id, n)| (id, n.resource.metadata.requires.len()))
            .collect();
        let mut frontier: BTreeSet<ActionId> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| (*id).clone())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = frontier.iter().next().cloned() {
            frontier.remove(&id);
            order.push(id.clone());
            let mut newly_ready: Vec<ActionId> = Vec::new();
            for dependent in &self.nodes[&id].dependents {
                let deg = indegree.get_mut(dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    newly_ready.push(dependent.clone());
                }
            }
            frontier.extend(newly_ready);
        }

        if order.len() != self.nodes.len() {
            return Err(dependency_failed_error("cycle detected: topological sort could not order all resources"));
        }
        Ok(order)
    }

    /// The transitive-requires closure of `target`, in topological order,
    /// with `target` last.
    pub fn get_execution_order(&self, target: &ActionId) -> Result<Vec<ActionId>> {
        if !self.nodes.contains_key(target) {
            return Err(not_found_error(format!("unknown target action id '{target}'")));
        }
        let closure = self.get_transitive_dependencies(target)?;
        let full_order = self.topological_sort()?;
        Ok(full_order
            .into_iter()
            .filter(|id| id == target || closure.contains(id))
            .collect())
    }

    /// The set of reachable predecessors of `target` (not including
    /// `target` itself).
    pub fn get_transitive_dependencies(&self, target: &ActionId) -> Result<HashSet<ActionId>> {
        if !self.nodes.contains_key(target) {
            return Err(not_found_error(format!("unknown target action id '{target}'")));
        }
        let mut seen = HashSet::new();
        let mut stack = vec![target.clone()];
        while let Some(id) = stack.pop() {
            for dep in &self.nodes[&id].resource.metadata.requires {
                if seen.insert(dep.clone()) {
                    stack.push(dep.clone());
                }
            }
        }
        Ok(seen)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn resource(&self, id: &ActionId) -> Option<&Resource> {
        self.nodes.get(id).map(|n| &n.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphflow_core::types::{Expression, LlmConfig, ResourceKind, ResourceMetadata, RunConfig};

    fn resource(id: &str, requires: &[&str]) -> Resource {
        Resource {
            metadata: ResourceMetadata {
                action_id: ActionId::new(id),
                name: id.to_string(),
                requires: requires.iter().map(|r| ActionId::new(*r)).collect(),
            },
            run: RunConfig {
                kind: ResourceKind::Llm(LlmConfig {
                    prompt: Expression::literal("hi"),
                    model: None,
                    system_prompt: None,
                    temperature: None,
                    max_tokens: None,
                }),
                skip_condition: None,
                preflight_check: None,
                on_error: None,
            },
        }
    }

    fn build_graph(resources: Vec<Resource>) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for r in resources {
            graph.add_resource(r)?;
        }
        graph.build()?;
        Ok(graph)
    }

    #[test]
    fn linear_chain_orders_every_node_after_its_requirements() {
        let graph = build_graph(vec![
            resource("a", &[]),
            resource("b", &["a"]),
            resource("c", &["b"]),
        ])
        .unwrap();
        let order = graph.topological_sort().unwrap();
        let pos = |id: &str| order.iter().position(|x| x.as_str() == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn diamond_orders_a_first_d_last_and_b_c_between() {
        let graph = build_graph(vec![
            resource("a", &[]),
            resource("b", &["a"]),
            resource("c", &["a"]),
            resource("d", &["b", "c"]),
        ])
        .unwrap();
        let order = graph.topological_sort().unwrap();
        let pos = |id: &str| order.iter().position(|x| x.as_str() == id).unwrap();
        assert_eq!(pos("a"), 0);
        assert_eq!(pos("d"), 3);
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));

        let exec_order = graph.get_execution_order(&ActionId::new("d")).unwrap();
        assert_eq!(exec_order.len(), 4);
    }

    #[test]
    fn cyclic_requires_fails_to_build() {
        let mut graph = DependencyGraph::new();
        graph.add_resource(resource("a", &["b"])).unwrap();
        graph.add_resource(resource("b", &["a"])).unwrap();
        let err = graph.build().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn missing_requirement_fails_to_build() {
        let mut graph = DependencyGraph::new();
        graph.add_resource(resource("a", &["ghost"])).unwrap();
        assert!(graph.build().is_err());
    }

    #[test]
    fn duplicate_action_id_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_resource(resource("a", &[])).unwrap();
        assert!(graph.add_resource(resource("a", &[])).is_err());
    }

    #[test]
    fn execution_order_excludes_unrelated_resources() {
        let graph = build_graph(vec![
            resource("a", &[]),
            resource("b", &["a"]),
            resource("unrelated", &[]),
        ])
        .unwrap();
        let order = graph.get_execution_order(&ActionId::new("b")).unwrap();
        assert_eq!(order.len(), 2);
        assert!(!order.iter().any(|id| id.as_str() == "unrelated"));
    }

    #[test]
    fn get_execution_order_errors_on_unknown_target() {
        let graph = build_graph(vec![resource("a", &[])]).unwrap();
        assert!(graph.get_execution_order(&ActionId::new("missing")).is_err());
    }
}
