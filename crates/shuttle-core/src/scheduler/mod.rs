//! Fair-share scheduling across concurrently running workflows.
//!
//! - `weighted`: 重み付きランダム選択（累積境界 + 二分探索）
//! - `weight`: workflow ごとの重み policy
//! - `fair_share`: tag ごとのテーブル管理（WorkflowObserver）

pub mod fair_share;
pub mod weight;
pub mod weighted;

pub use self::fair_share::FairShareScheduler;
pub use self::weight::{ConfiguredWeight, UniformWeight, WeightFunction};
pub use self::weighted::WeightedRoundRobin;
