//! Engine configuration loaded from `shuttle.toml`.
//!
//! ```toml
//! [engine]
//! lease_timeout_ms = 10000
//!
//! [workers.split]
//! threads = 2
//!
//! [workers.join]
//! factory = "join"
//!
//! [workflows.squares]
//! start = "split"
//! end = "end"
//! transitions = [
//!     { from = "split", on = "next", to = "square" },
//! ]
//! joins = { join = 4 }
//! ```
//!
//! 読み込み時に step graph を検証します。参照される tag はすべて
//! `[workers]` に宣言されている必要があります。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{StepGraph, WorkflowCatalog};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("workflow '{workflow}' references undeclared worker '{tag}'")]
    UndeclaredWorker { workflow: String, tag: String },

    #[error("worker '{0}' must run at least one thread")]
    NoThreads(String),

    #[error("join '{tag}' of workflow '{workflow}' must expect at least one sentinel")]
    EmptyJoin { workflow: String, tag: String },

    #[error("workflow '{workflow}' has invalid weight {weight}")]
    InvalidWeight { workflow: String, weight: f64 },

    #[error("no workflows configured")]
    NoWorkflows,
}

/// Timing and sizing knobs of the engine loops.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_lease_timeout_ms")]
    pub lease_timeout_ms: u64,

    /// Sleep between empty lease polls.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    #[serde(default = "default_job_starter_interval_ms")]
    pub job_starter_interval_ms: u64,

    #[serde(default = "default_scheduler_interval_ms")]
    pub scheduler_interval_ms: u64,

    /// Parameter values whose encoded size exceeds this many bytes are
    /// persisted out of line.
    #[serde(default = "default_inline_param_limit")]
    pub inline_param_limit: usize,
}

fn default_lease_timeout_ms() -> u64 {
    10_000
}

fn default_idle_backoff_ms() -> u64 {
    1_000
}

fn default_job_starter_interval_ms() -> u64 {
    2_000
}

fn default_scheduler_interval_ms() -> u64 {
    5_000
}

fn default_inline_param_limit() -> usize {
    4_096
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lease_timeout_ms: default_lease_timeout_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
            job_starter_interval_ms: default_job_starter_interval_ms(),
            scheduler_interval_ms: default_scheduler_interval_ms(),
            inline_param_limit: default_inline_param_limit(),
        }
    }
}

impl EngineSettings {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn job_starter_interval(&self) -> Duration {
        Duration::from_millis(self.job_starter_interval_ms)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }
}

/// One worker pool: `threads` loops running the factory's worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerPoolConfig {
    /// Registered factory name. Defaults to the worker tag itself.
    #[serde(default)]
    pub factory: Option<String>,

    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitionConfig {
    pub from: String,
    pub on: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowConfig {
    pub start: String,

    #[serde(default = "default_end")]
    pub end: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,

    /// join tag -> expected sentinel count
    #[serde(default)]
    pub joins: BTreeMap<String, usize>,
}

fn default_end() -> String {
    "end".to_string()
}

fn default_weight() -> f64 {
    1.0
}

impl WorkflowConfig {
    fn to_graph(&self, name: &str) -> StepGraph {
        let mut graph = StepGraph::new(name, &self.start, &self.end).with_weight(self.weight);
        for t in &self.transitions {
            graph = graph.with_transition(&t.from, &t.on, &t.to);
        }
        for (tag, expected) in &self.joins {
            graph = graph.with_join(tag, *expected);
        }
        graph
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShuttleConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub workers: BTreeMap<String, WorkerPoolConfig>,

    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowConfig>,
}

impl ShuttleConfig {
    /// Parse and validate.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ShuttleConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflows.is_empty() {
            return Err(ConfigError::NoWorkflows);
        }
        for (tag, pool) in &self.workers {
            if pool.threads == 0 {
                return Err(ConfigError::NoThreads(tag.clone()));
            }
        }
        for (name, workflow) in &self.workflows {
            if !workflow.weight.is_finite() || workflow.weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    workflow: name.clone(),
                    weight: workflow.weight,
                });
            }
            if let Some((tag, _)) = workflow.joins.iter().find(|(_, n)| **n == 0) {
                return Err(ConfigError::EmptyJoin {
                    workflow: name.clone(),
                    tag: tag.clone(),
                });
            }
            let graph = workflow.to_graph(name);
            if let Some(tag) = graph
                .steps()
                .into_iter()
                .find(|tag| !self.workers.contains_key(*tag))
            {
                return Err(ConfigError::UndeclaredWorker {
                    workflow: name.clone(),
                    tag: tag.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> WorkflowCatalog {
        let mut catalog = WorkflowCatalog::new();
        for (name, workflow) in &self.workflows {
            catalog.insert(workflow.to_graph(name));
        }
        catalog
    }

    /// `(tag, factory name, threads)` for every declared worker pool.
    pub fn worker_pools(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.workers.iter().map(|(tag, pool)| {
            let factory = pool.factory.as_deref().unwrap_or(tag.as_str());
            (tag.as_str(), factory, pool.threads)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARES: &str = r#"
        [engine]
        lease_timeout_ms = 500

        [workers.split]
        threads = 2
        [workers.square]
        threads = 4
        [workers.join]
        factory = "join"
        [workers.sum]
        [workers.end]

        [workflows.squares]
        start = "split"
        transitions = [
            { from = "split", on = "next", to = "square" },
            { from = "square", on = "next", to = "join" },
            { from = "join", on = "next", to = "sum" },
            { from = "sum", on = "next", to = "end" },
        ]
        joins = { join = 4 }
    "#;

    #[test]
    fn parses_with_defaults() {
        let config = ShuttleConfig::from_toml_str(SQUARES).unwrap();
        assert_eq!(config.engine.lease_timeout_ms, 500);
        assert_eq!(config.engine.idle_backoff_ms, 1_000);
        assert_eq!(config.engine.inline_param_limit, 4_096);

        let pools: Vec<_> = config.worker_pools().collect();
        assert!(pools.contains(&("join", "join", 1)));
        assert!(pools.contains(&("square", "square", 4)));

        let catalog = config.catalog();
        let graph = catalog.require("squares").unwrap();
        assert_eq!(graph.end(), "end");
        assert_eq!(graph.weight(), 1.0);
        assert_eq!(graph.resolve_step("square", "next"), "join");
        assert_eq!(graph.join_inputs("join"), 4);
    }

    #[test]
    fn undeclared_worker_is_rejected() {
        let source = SQUARES.replace("[workers.sum]", "");
        let err = ShuttleConfig::from_toml_str(&source).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UndeclaredWorker { ref tag, .. } if tag == "sum"
        ));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let source = SQUARES.replace("threads = 2", "threads = 0");
        let err = ShuttleConfig::from_toml_str(&source).unwrap_err();
        assert!(matches!(err, ConfigError::NoThreads(tag) if tag == "split"));
    }

    #[test]
    fn empty_join_is_rejected() {
        let source = SQUARES.replace("join = 4", "join = 0");
        let err = ShuttleConfig::from_toml_str(&source).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyJoin { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ShuttleConfig::load("/nonexistent/shuttle.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn empty_config_has_no_workflows() {
        assert!(matches!(
            ShuttleConfig::from_toml_str("").unwrap_err(),
            ConfigError::NoWorkflows
        ));
    }
}
