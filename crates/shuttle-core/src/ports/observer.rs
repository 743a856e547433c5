//! WorkflowObserver port - workflow の開始・終了イベントの購読
//!
//! fair-share scheduler はこの port 経由でテーブルを作り直します。

use async_trait::async_trait;

use crate::domain::{WorkflowId, WorkflowInstance};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Started {
        workflow_id: WorkflowId,
        name: String,
    },
    Finished {
        workflow_id: WorkflowId,
        name: String,
        failed: bool,
    },
}

impl WorkflowEvent {
    pub fn started(workflow: &WorkflowInstance) -> Self {
        WorkflowEvent::Started {
            workflow_id: workflow.workflow_id(),
            name: workflow.name().to_string(),
        }
    }

    pub fn finished(workflow: &WorkflowInstance) -> Self {
        WorkflowEvent::Finished {
            workflow_id: workflow.workflow_id(),
            name: workflow.name().to_string(),
            failed: workflow.is_failed(),
        }
    }

    pub fn workflow_id(&self) -> WorkflowId {
        match self {
            WorkflowEvent::Started { workflow_id, .. }
            | WorkflowEvent::Finished { workflow_id, .. } => *workflow_id,
        }
    }
}

/// Observers must not fail the caller: errors are theirs to log.
#[async_trait]
pub trait WorkflowObserver: Send + Sync {
    async fn on_workflow_event(&self, event: &WorkflowEvent);
}
