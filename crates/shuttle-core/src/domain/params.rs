//! Task parameters: an ordered, append-only name → value bag.
//!
//! Values carry an explicit type tag on the wire (`{"type": "int", "value": 3}`)
//! so older readers can still decode the envelope and skip what they do not know.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ids::ValueHandle;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    List(Vec<ParamValue>),
    /// Value stored out of line in the repository.
    Ref(ValueHandle),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, ParamValue::Ref(_))
    }

    /// Size of the JSON encoding, used to decide whether a value is stored inline.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(value: Vec<ParamValue>) -> Self {
        ParamValue::List(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

/// Ordered parameter bag.
///
/// Insertion order is preserved. Names are unique and entries are never
/// removed; once the owning task is enqueued the bag is only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a parameter. Duplicate names are rejected.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<(), DomainError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(DomainError::DuplicateParam(name));
        }
        self.0.push(Param {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Builder form of [`Params::insert`].
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<Self, DomainError> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn require(&self, name: &str) -> Result<&ParamValue, DomainError> {
        self.get(name)
            .ok_or_else(|| DomainError::MissingParam(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, DomainError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| DomainError::ParamType {
                name: name.to_string(),
                expected: "str",
            })
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, DomainError> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| DomainError::ParamType {
                name: name.to_string(),
                expected: "int",
            })
    }

    pub fn require_list(&self, name: &str) -> Result<&[ParamValue], DomainError> {
        self.require(name)?
            .as_list()
            .ok_or_else(|| DomainError::ParamType {
                name: name.to_string(),
                expected: "list",
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mutable access for the history layer, which swaps large values for refs.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.0.iter_mut()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
