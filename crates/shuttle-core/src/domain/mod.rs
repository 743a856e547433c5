//! Domain model (ids, params, tasks, workflows, jobs, outcomes, step graph).
//!
//! このモジュールは queue や repository を前提にしません。
//! 「何を記録し、どう遷移するか」だけを定義します。

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod params;
pub mod step_graph;
pub mod task;
pub mod workflow;

pub use self::envelope::{ENVELOPE_VERSION, TaskEnvelope};
pub use self::errors::DomainError;
pub use self::ids::{EntryId, JobId, TaskId, ValueHandle, WorkflowId};
pub use self::job::{Job, JobState, JobStatus};
pub use self::outcome::{Outcome, TaskResult};
pub use self::params::{Param, ParamValue, Params};
pub use self::step_graph::{StepGraph, UnknownWorkflow, WorkflowCatalog};
pub use self::task::{Task, TaskKind};
pub use self::workflow::{WorkerTiming, WorkflowInstance, WorkflowStats};
