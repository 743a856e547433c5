//! Step graph: per-workflow routing table.
//!
//! `(current step, symbolic next) -> concrete next`. Pure lookup over
//! configuration loaded once at startup.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow '{0}'")]
pub struct UnknownWorkflow(pub String);

/// Routing table of one named workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct StepGraph {
    name: String,
    start: String,
    end: String,
    weight: f64,
    transitions: HashMap<(String, String), String>,
    /// join step -> number of sentinels it waits for
    joins: HashMap<String, usize>,
}

impl StepGraph {
    pub fn new(name: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            weight: 1.0,
            transitions: HashMap::new(),
            joins: HashMap::new(),
        }
    }

    pub fn with_transition(
        mut self,
        from: impl Into<String>,
        on: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.transitions.insert((from.into(), on.into()), to.into());
        self
    }

    pub fn with_join(mut self, step: impl Into<String>, expected_sentinels: usize) -> Self {
        self.joins.insert(step.into(), expected_sentinels);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    /// Terminal step: the end sentinel reaching it finishes the workflow.
    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn is_end_step(&self, step: &str) -> bool {
        self.end == step
    }

    /// Concrete next step. Without an explicit mapping the symbolic name is
    /// returned unchanged, so workers may also address steps directly.
    pub fn resolve_step<'a>(&'a self, current: &str, symbolic: &'a str) -> &'a str {
        self.transitions
            .get(&(current.to_string(), symbolic.to_string()))
            .map(String::as_str)
            .unwrap_or(symbolic)
    }

    /// Sentinels a join step waits for (1 when the step is not declared).
    pub fn join_inputs(&self, step: &str) -> usize {
        self.joins.get(step).copied().unwrap_or(1)
    }

    /// Every step tag the graph mentions.
    pub fn steps(&self) -> BTreeSet<&str> {
        let mut steps = BTreeSet::new();
        steps.insert(self.start.as_str());
        steps.insert(self.end.as_str());
        for ((from, _), to) in &self.transitions {
            steps.insert(from.as_str());
            steps.insert(to.as_str());
        }
        for step in self.joins.keys() {
            steps.insert(step.as_str());
        }
        steps
    }

    pub fn uses_step(&self, step: &str) -> bool {
        self.steps().contains(step)
    }

    pub(crate) fn join_steps(&self) -> impl Iterator<Item = (&str, usize)> {
        self.joins.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// All configured workflows, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    graphs: HashMap<String, StepGraph>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, graph: StepGraph) {
        self.graphs.insert(graph.name.clone(), graph);
    }

    pub fn with(mut self, graph: StepGraph) -> Self {
        self.insert(graph);
        self
    }

    pub fn get(&self, name: &str) -> Option<&StepGraph> {
        self.graphs.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&StepGraph, UnknownWorkflow> {
        self.get(name)
            .ok_or_else(|| UnknownWorkflow(name.to_string()))
    }

    pub fn resolve_step(
        &self,
        workflow: &str,
        current: &str,
        symbolic: &str,
    ) -> Result<String, UnknownWorkflow> {
        Ok(self
            .require(workflow)?
            .resolve_step(current, symbolic)
            .to_string())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &StepGraph> {
        self.graphs.values()
    }
}
