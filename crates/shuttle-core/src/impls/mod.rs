//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskQueue**: lease 付きの作業キュー
//! - **InMemoryRepository**: job / workflow / task の正本
//! - **InMemoryBlobCache**: worker 間の blob 受け渡し
//!
//! # 本番用実装
//! 永続化が必要な場合は同じ ports を別クレートで実装します。

pub mod inmem_blob;
pub mod inmem_queue;
pub mod inmem_repository;

pub use self::inmem_blob::InMemoryBlobCache;
pub use self::inmem_queue::InMemoryTaskQueue;
pub use self::inmem_repository::InMemoryRepository;
