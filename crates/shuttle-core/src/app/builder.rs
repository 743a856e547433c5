//! EngineBuilder - 設定と worker factory から Engine を組み立てる
//!
//! # Fail-fast 設計
//! - 設定ファイルが参照する factory 名がすべて登録済みかを build() でチェック
//! - 不足があれば BuildError::MissingFactories を返し、何も起動しない
//! - ジョブ投入後に「worker がいない」ことに気づく状況を作らない

use std::sync::Arc;

use tracing::info;

use super::context::EngineContext;
use super::engine::{Engine, PoolSpec};
use super::registry::WorkerRegistry;
use super::workflows::WorkflowService;
use crate::config::ShuttleConfig;
use crate::error::EngineError;
use crate::ports::{Clock, SystemClock};
use crate::scheduler::{ConfiguredWeight, FairShareScheduler, UniformWeight, WeightFunction};
use crate::workers::Worker;

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing worker factories: {0:?}. These factories are referenced by the configuration but not registered.")]
    MissingFactories(Vec<String>),
}

/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new(ShuttleConfig::load("shuttle.toml")?)
///     .register("split", || SplitWorker)?
///     .register("square", || SquareWorker)?
///     .build()?;
/// let handle = engine.spawn().await?;
/// ```
pub struct EngineBuilder {
    config: ShuttleConfig,
    registry: WorkerRegistry,
    clock: Arc<dyn Clock>,
    configured_weights: bool,
}

impl EngineBuilder {
    /// Builder with the built-in `join`, `end` and `forward` factories.
    pub fn new(config: ShuttleConfig) -> Self {
        Self {
            config,
            registry: WorkerRegistry::with_builtins(),
            clock: Arc::new(SystemClock),
            configured_weights: false,
        }
    }

    pub fn register<F, W>(mut self, name: impl Into<String>, factory: F) -> Result<Self, EngineError>
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: Worker + 'static,
    {
        self.registry.register(name, factory)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use each workflow's configured `weight` for fair-share tables
    /// instead of treating every workflow equally.
    pub fn with_configured_weights(mut self) -> Self {
        self.configured_weights = true;
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;

        let mut missing: Vec<String> = self
            .config
            .worker_pools()
            .filter(|(_, factory, _)| !self.registry.contains(factory))
            .map(|(_, factory, _)| factory.to_string())
            .collect();
        missing.sort();
        missing.dedup();
        if !missing.is_empty() {
            return Err(BuildError::MissingFactories(missing).into());
        }

        let pools: Vec<PoolSpec> = self
            .config
            .worker_pools()
            .map(|(tag, factory, threads)| PoolSpec {
                tag: tag.to_string(),
                factory: factory.to_string(),
                threads,
            })
            .collect();

        let ctx = EngineContext::in_memory_with_clock(self.config.catalog(), self.config.engine, self.clock);
        let weights: Arc<dyn WeightFunction> = if self.configured_weights {
            Arc::new(ConfiguredWeight::new(ctx.catalog.clone()))
        } else {
            Arc::new(UniformWeight)
        };
        let scheduler = Arc::new(FairShareScheduler::new(
            ctx.catalog.clone(),
            weights,
            ctx.repository.clone(),
        ));
        let workflows = WorkflowService::new(ctx.repository.clone(), ctx.clock.clone())
            .with_observer(scheduler.clone());

        info!(
            workflows = self.config.workflows.len(),
            pools = pools.len(),
            "engine built"
        );
        Ok(Engine::new(ctx, self.registry, pools, scheduler, workflows))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::app::registry::RegistryError;
    use crate::domain::{Task, TaskResult};
    use crate::workers::{WorkContext, WorkerError};

    struct Noop;

    #[async_trait]
    impl Worker for Noop {
        async fn work(&self, _task: Task, _ctx: &WorkContext) -> Result<TaskResult, WorkerError> {
            Ok(TaskResult::success())
        }
    }

    const CONFIG: &str = r#"
        [workers.split]
        [workers.square]
        factory = "squarer"
        [workers.end]

        [workflows.squares]
        start = "split"
        transitions = [
            { from = "split", on = "next", to = "square" },
            { from = "square", on = "next", to = "end" },
        ]
    "#;

    fn config() -> ShuttleConfig {
        ShuttleConfig::from_toml_str(CONFIG).unwrap()
    }

    #[test]
    fn build_success() {
        let engine = EngineBuilder::new(config())
            .register("split", || Noop)
            .unwrap()
            .register("squarer", || Noop)
            .unwrap()
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn build_reports_every_missing_factory() {
        let result = EngineBuilder::new(config()).build();
        assert!(matches!(
            result,
            Err(EngineError::Build(BuildError::MissingFactories(missing)))
                if missing == vec!["split".to_string(), "squarer".to_string()]
        ));
    }

    #[test]
    fn duplicate_factory_is_rejected() {
        let result = EngineBuilder::new(config()).register("join", || Noop);
        assert!(matches!(
            result,
            Err(EngineError::Registry(RegistryError::DuplicateFactory(name))) if name == "join"
        ));
    }
}
