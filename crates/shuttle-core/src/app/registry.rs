//! WorkerRegistry - factory 名 → Worker 生成関数
//!
//! 初期化時にだけ変更し、実行時は読み取り専用で使います。
//! 重複登録はエラーです（後勝ちにはしない）。

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::workers::{ForwardWorker, JoinWorker, TerminalWorker, Worker};

pub type WorkerFactory = Arc<dyn Fn() -> Arc<dyn Worker> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("worker factory '{0}' is already registered")]
    DuplicateFactory(String),

    #[error("worker factory '{0}' is not registered")]
    UnknownFactory(String),
}

#[derive(Clone, Default)]
pub struct WorkerRegistry {
    factories: HashMap<String, WorkerFactory>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with `join`, `end` and `forward`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, WorkerFactory); 3] = [
            ("join", Arc::new(|| Arc::new(JoinWorker) as Arc<dyn Worker>)),
            ("end", Arc::new(|| Arc::new(TerminalWorker) as Arc<dyn Worker>)),
            ("forward", Arc::new(|| Arc::new(ForwardWorker) as Arc<dyn Worker>)),
        ];
        for (name, factory) in builtins {
            registry.factories.insert(name.to_string(), factory);
        }
        registry
    }

    pub fn register<F, W>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: Worker + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateFactory(name));
        }
        self.factories
            .insert(name, Arc::new(move || Arc::new(factory()) as Arc<dyn Worker>));
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Worker>, RegistryError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownFactory(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
