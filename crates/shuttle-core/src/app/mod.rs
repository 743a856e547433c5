//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてエンジンを実装します。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: 設定と worker factory からのワイヤリング（fail-fast 検証）
//! - **Engine / EngineHandle**: ジョブ API と全ループの起動・停止
//! - **JobService**: submit / get / list / live stats
//! - **JobStarter**: 開始時刻を過ぎた job の起動
//! - **WorkerLoop**: タスク実行ループ（lease→execute→publish→delete）
//! - **WorkerGroup**: 同じ tag の WorkerLoop を束ねる
//! - **SchedulerLoop**: fair-share テーブルの定期整合
//! - **TaskHistory**: タスク履歴（大きなパラメータ値は別保存）

pub mod builder;
pub mod context;
pub mod engine;
pub mod history;
pub mod job_starter;
pub mod jobs;
pub mod registry;
pub mod scheduler_loop;
pub mod status;
pub mod worker_group;
pub mod worker_loop;
pub mod workflows;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::context::EngineContext;
pub use self::engine::{Engine, EngineHandle};
pub use self::history::TaskHistory;
pub use self::job_starter::JobStarter;
pub use self::jobs::JobService;
pub use self::registry::{RegistryError, WorkerFactory, WorkerRegistry};
pub use self::scheduler_loop::SchedulerLoop;
pub use self::status::{LiveStats, WorkerProgress};
pub use self::worker_group::WorkerGroup;
pub use self::worker_loop::{Processed, WorkerLoop, WorkerState};
pub use self::workflows::WorkflowService;
