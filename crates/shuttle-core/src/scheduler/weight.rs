//! Weight policies for the fair-share tables.

use std::sync::Arc;

use crate::domain::{WorkflowCatalog, WorkflowId};

pub trait WeightFunction: Send + Sync {
    fn weight(&self, workflow_id: WorkflowId, workflow_name: &str) -> f64;
}

/// Every active workflow gets the same share.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeight;

impl WeightFunction for UniformWeight {
    fn weight(&self, _workflow_id: WorkflowId, _workflow_name: &str) -> f64 {
        1.0
    }
}

/// Per-workflow-type weight taken from the step graph configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredWeight {
    catalog: Arc<WorkflowCatalog>,
}

impl ConfiguredWeight {
    pub fn new(catalog: Arc<WorkflowCatalog>) -> Self {
        Self { catalog }
    }
}

impl WeightFunction for ConfiguredWeight {
    fn weight(&self, _workflow_id: WorkflowId, workflow_name: &str) -> f64 {
        self.catalog
            .get(workflow_name)
            .map(|graph| graph.weight())
            .unwrap_or(1.0)
    }
}
