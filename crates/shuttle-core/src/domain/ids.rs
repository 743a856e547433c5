//! Domain identifiers (strongly-typed IDs).
//!
//! すべての ID は ULID ベースの `Id<T>` で表現します。
//! `T` は実行時には使わないマーカー型 (PhantomData) で、
//! JobId と TaskId を取り違えるとコンパイルエラーになります。
//!
//! ULID は生成時刻でソートできるため、queue の tie-break にも使えます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker for the kind of entity an [`Id`] names. Supplies the display prefix.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID tagged with the entity kind `T`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when parsing an id from its display form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{0}'")]
pub struct ParseIdError(pub String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    /// Accepts both `job-01H...` and the bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Job のマーカー型
    Job,
    "job-"
);
id_marker!(
    /// Workflow instance のマーカー型
    Workflow,
    "wf-"
);
id_marker!(
    /// Task のマーカー型
    Task,
    "task-"
);
id_marker!(
    /// Queue entry のマーカー型
    Entry,
    "entry-"
);
id_marker!(
    /// Out-of-line parameter value のマーカー型
    Value,
    "value-"
);

/// Identifier of a Job (submit/status unit).
pub type JobId = Id<Job>;

/// Identifier of one running workflow instance.
pub type WorkflowId = Id<Workflow>;

/// Identifier of a Task (start, work or end sentinel).
pub type TaskId = Id<Task>;

/// Opaque handle of a queued entry, returned by `add` and `lease`.
pub type EntryId = Id<Entry>;

/// Handle of a parameter value stored out of line.
pub type ValueHandle = Id<Value>;
