use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use weft_core::error::{Result, WeftError};
use weft_core::types::WorkflowStatus;

use crate::step::Step;

/// A named, insertion-ordered collection of steps.
///
/// Steps are stored in declaration order; dependency resolution and the
/// topological tie-break both key off that order, so execution order is
/// reproducible across runs and platforms. `status` and `results` are
/// mutated only by the runner, which resets both at the start of each run.
#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub name: String,
    steps: Vec<Step>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    pub status: WorkflowStatus,
    #[serde(skip)]
    pub results: HashMap<String, serde_json::Value>,
}

impl Workflow {
    /// Create a workflow from an ordered step list.
    ///
    /// Fails if two steps share a name. Dependency references are validated
    /// later, by the graph.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self> {
        let mut index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.name.clone(), i).is_some() {
                return Err(WeftError::DuplicateStep(step.name.clone()));
            }
        }

        Ok(Self {
            name: name.into(),
            steps,
            index,
            status: WorkflowStatus::Pending,
            results: HashMap::new(),
        })
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step names in declaration order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Serde-facing workflow definition, as read from a TOML file or a gateway
/// request body. Converted into a [`Workflow`] with `try_from`, which is
/// where duplicate names are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub name: String,
    #[serde(rename = "step", alias = "steps", default)]
    pub steps: Vec<Step>,
}

impl TryFrom<WorkflowDef> for Workflow {
    type Error = WeftError;

    fn try_from(def: WorkflowDef) -> Result<Self> {
        Workflow::new(def.name, def.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let wf = Workflow::new(
            "demo",
            vec![
                Step::new("c", "noop"),
                Step::new("a", "noop"),
                Step::new("b", "noop"),
            ],
        )
        .unwrap();

        let names: Vec<_> = wf.step_names().collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(wf.status, WorkflowStatus::Pending);
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let result = Workflow::new(
            "demo",
            vec![Step::new("fetch", "http_get"), Step::new("fetch", "chat")],
        );

        assert!(matches!(result, Err(WeftError::DuplicateStep(name)) if name == "fetch"));
    }

    #[test]
    fn test_lookup_by_name() {
        let wf = Workflow::new("demo", vec![Step::new("fetch", "http_get")]).unwrap();
        assert_eq!(wf.get("fetch").unwrap().action, "http_get");
        assert!(wf.get("ghost").is_none());
    }

    #[test]
    fn test_def_round_trip() {
        let def: WorkflowDef = serde_json::from_value(serde_json::json!({
            "name": "demo",
            "steps": [
                {"name": "fetch", "action": "http_get"},
                {"name": "summarize", "action": "chat", "depends_on": ["fetch"]},
            ]
        }))
        .unwrap();

        let wf = Workflow::try_from(def).unwrap();
        assert_eq!(wf.len(), 2);
        assert_eq!(wf.get("summarize").unwrap().depends_on, vec!["fetch"]);
    }
}
