//! Dependency graph validation and execution ordering.

use std::collections::{HashMap, VecDeque};

use weft_core::error::{Result, WeftError};

use crate::workflow::Workflow;

/// Dependency relationships between a workflow's steps.
///
/// Building the graph checks that every declared dependency names a step in
/// the same workflow. Cycle detection and ordering are separate, pure
/// queries; nothing here mutates the workflow.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step names in declaration order.
    order: Vec<String>,
    /// Step name -> direct dependencies (declaration order, deduplicated).
    dependencies: HashMap<String, Vec<String>>,
    /// Step name -> steps that depend on it.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph for a workflow.
    ///
    /// Fails with `UnknownDependency` if a step references a name that is
    /// not a step in the workflow.
    pub fn build(workflow: &Workflow) -> Result<Self> {
        let order: Vec<String> = workflow.step_names().map(str::to_string).collect();

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::with_capacity(order.len());
        let mut dependents: HashMap<String, Vec<String>> = HashMap::with_capacity(order.len());
        for name in &order {
            dependents.insert(name.clone(), Vec::new());
        }

        for step in workflow.steps() {
            let mut deps: Vec<String> = Vec::with_capacity(step.depends_on.len());
            for dep in &step.depends_on {
                if workflow.get(dep).is_none() {
                    return Err(WeftError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                // Ignore a dependency listed twice
                if !deps.contains(dep) {
                    deps.push(dep.clone());
                }
            }
            for dep in &deps {
                dependents
                    .get_mut(dep)
                    .expect("dependents seeded for every step")
                    .push(step.name.clone());
            }
            dependencies.insert(step.name.clone(), deps);
        }

        Ok(Self {
            order,
            dependencies,
            dependents,
        })
    }

    /// Check that the graph is acyclic.
    ///
    /// Depth-first traversal with an on-path marker: revisiting a node that
    /// is still on the current path is a cycle. The error carries the cycle
    /// path, closed on the repeated step.
    pub fn validate(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            OnPath,
            Done,
        }

        fn visit(
            node: &str,
            graph: &DependencyGraph,
            state: &mut HashMap<String, State>,
            path: &mut Vec<String>,
        ) -> Result<()> {
            state.insert(node.to_string(), State::OnPath);
            path.push(node.to_string());

            if let Some(deps) = graph.dependencies.get(node) {
                for dep in deps {
                    match state.get(dep.as_str()).copied().unwrap_or(State::Unvisited) {
                        State::OnPath => {
                            let start = path.iter().position(|s| s == dep).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start..].to_vec();
                            cycle.push(dep.clone());
                            return Err(WeftError::CircularDependency { steps: cycle });
                        }
                        State::Unvisited => visit(dep, graph, state, path)?,
                        State::Done => {}
                    }
                }
            }

            path.pop();
            state.insert(node.to_string(), State::Done);
            Ok(())
        }

        let mut state: HashMap<String, State> = self
            .order
            .iter()
            .map(|s| (s.clone(), State::Unvisited))
            .collect();
        let mut path = Vec::new();

        for node in &self.order {
            if state.get(node.as_str()) == Some(&State::Unvisited) {
                visit(node, self, &mut state, &mut path)?;
            }
        }

        Ok(())
    }

    /// Step names in a valid execution order (dependencies before dependents).
    ///
    /// Kahn's algorithm with a FIFO queue seeded in declaration order, so
    /// ties between ready steps resolve to the order the steps were declared
    /// in. Fails with `CircularDependency` naming the unprocessed remainder
    /// if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|name| {
                (
                    name.as_str(),
                    self.dependencies.get(name).map_or(0, |d| d.len()),
                )
            })
            .collect();

        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|name| in_degree[name] == 0)
            .collect();

        let mut result = Vec::with_capacity(self.order.len());

        while let Some(name) = queue.pop_front() {
            result.push(name.to_string());

            if let Some(dependents) = self.dependents.get(name) {
                for dependent in dependents {
                    let degree = in_degree
                        .get_mut(dependent.as_str())
                        .expect("in-degree seeded for every step");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        if result.len() != self.order.len() {
            let remaining: Vec<String> = self
                .order
                .iter()
                .filter(|name| in_degree[name.as_str()] > 0)
                .cloned()
                .collect();
            return Err(WeftError::CircularDependency { steps: remaining });
        }

        Ok(result)
    }

    /// Direct dependencies of a step.
    pub fn dependencies_of(&self, step: &str) -> Option<&[String]> {
        self.dependencies.get(step).map(Vec::as_slice)
    }

    /// Steps that directly depend on the given step.
    pub fn dependents_of(&self, step: &str) -> Option<&[String]> {
        self.dependents.get(step).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
