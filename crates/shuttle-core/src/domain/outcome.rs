//! Outcome model: what a worker reports back after handling one task.

use serde::{Deserialize, Serialize};

use super::task::Task;

/// Classification of a worker result.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / ERROR / EXCEPTION / ARGUMENT_ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Successors are published.
    Success,

    /// Domain-level failure detected by the worker (e.g. empty join).
    Error,

    /// Unexpected failure while running the worker.
    Exception,

    /// A required parameter was missing or malformed.
    ArgumentError,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Result of `work(...)`: an outcome plus the successor tasks.
///
/// `next_tasks` are only published on `SUCCESS`; their `worker` may be a
/// symbolic step name that the publisher resolves through the step graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub outcome: Outcome,
    pub next_tasks: Vec<Task>,
    /// Diagnostic message for non-success outcomes.
    pub message: Option<String>,
}

impl TaskResult {
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            next_tasks: Vec::new(),
            message: None,
        }
    }

    pub fn success_with(next_tasks: Vec<Task>) -> Self {
        Self {
            outcome: Outcome::Success,
            next_tasks,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::failed(Outcome::Error, message)
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::failed(Outcome::Exception, message)
    }

    pub fn argument_error(message: impl Into<String>) -> Self {
        Self::failed(Outcome::ArgumentError, message)
    }

    fn failed(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            next_tasks: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn with_next(mut self, task: Task) -> Self {
        self.next_tasks.push(task);
        self
    }
}
