//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（durable store, queue backing store, blob storage）
//! へのインターフェースで、コアは実装の詳細を知りません。
//!
//! 開発・テスト用の実装は `impls` にあります。

pub mod blob_cache;
pub mod clock;
pub mod id_generator;
pub mod observer;
pub mod repository;
pub mod task_queue;

pub use self::blob_cache::{BlobCache, BlobError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::observer::{WorkflowEvent, WorkflowObserver};
pub use self::repository::{PriorityEntry, Repository, StorageError};
pub use self::task_queue::{LeasedEntry, QueueError, TaskQueue};
