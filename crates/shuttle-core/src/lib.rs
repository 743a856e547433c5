//! shuttle-core
//!
//! Core building blocks for the Shuttle workflow engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, params, task, workflow, job, outcome, step_graph, errors）
//! - **ports**: 抽象化レイヤー（Repository, TaskQueue, BlobCache, Clock, IdGenerator, WorkflowObserver）
//! - **impls**: ports の in-memory 実装
//! - **scheduler**: fair-share スケジューリング（重み付きラウンドロビン）
//! - **workers**: Worker trait と組み込み worker（join, end, forward）
//! - **app**: エンジン本体（builder, engine, worker_loop, job_starter, ...）
//! - **config**: TOML 設定
//! - **error**: エンジン全体のエラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod scheduler;
pub mod workers;

pub use self::app::{Engine, EngineBuilder, EngineHandle, LiveStats};
pub use self::config::{ConfigError, EngineSettings, ShuttleConfig};
pub use self::domain::{JobId, JobState, JobStatus, Outcome, ParamValue, Params, Task, TaskResult};
pub use self::error::{EngineError, ErrorKind};
pub use self::workers::{NEXT, WorkContext, Worker, WorkerError};
