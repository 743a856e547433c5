//! Errors - ドメインモデルの不変条件違反
//!
//! 書き込み一回限りのフィールド（started_at / finished_at）や
//! パラメータの重複などはここで表現します。

use thiserror::Error;

/// DomainError はモデルの不変条件が破られたことを表す
///
/// どれも呼び出し側のロジックエラーを示すので、リトライしても直りません。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{entity} {field} is already set")]
    AlreadySet {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} {field} cannot be set before {required}")]
    OutOfOrder {
        entity: &'static str,
        field: &'static str,
        required: &'static str,
    },

    #[error("finish_before must be strictly after start_after")]
    InvalidSchedule,

    #[error("parameter '{0}' is already present")]
    DuplicateParam(String),

    #[error("missing required parameter '{0}'")]
    MissingParam(String),

    #[error("parameter '{name}' is not of type {expected}")]
    ParamType {
        name: String,
        expected: &'static str,
    },

    #[error("unsupported envelope version {found} (max supported {supported})")]
    UnsupportedEnvelope { found: u16, supported: u16 },

    #[error("envelope decode failed: {0}")]
    Envelope(String),
}

impl DomainError {
    pub(crate) fn already_set(entity: &'static str, field: &'static str) -> Self {
        DomainError::AlreadySet { entity, field }
    }
}
