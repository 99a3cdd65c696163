//! Channel values: the tagged types a method call carries in both directions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value on the channel. Mirrors the types a standard message codec can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Codec type name, used in argument errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Named arguments of one method call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments(BTreeMap<String, Value>);

/// A required argument was absent or had the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgError {
    #[error("missing argument `{0}`")]
    Missing(String),
    #[error("argument `{name}` must be {expected}, got {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Present and non-null. A null value counts as missing.
    fn present(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Required string argument.
    pub fn string(&self, name: &str) -> Result<&str, ArgError> {
        let value = self
            .present(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?;
        value.as_str().ok_or_else(|| wrong_type(name, "string", value))
    }

    /// Required integer argument.
    pub fn int(&self, name: &str) -> Result<i64, ArgError> {
        let value = self
            .present(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?;
        value.as_int().ok_or_else(|| wrong_type(name, "int", value))
    }

    /// Integer argument that falls back to `default` when absent. A present value of
    /// another type is still an error.
    pub fn optional_int(&self, name: &str, default: i64) -> Result<i64, ArgError> {
        match self.present(name) {
            None => Ok(default),
            Some(value) => value.as_int().ok_or_else(|| wrong_type(name, "int", value)),
        }
    }

    /// Required list whose every element is a string. Order is preserved.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, ArgError> {
        let value = self
            .present(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?;
        let Value::List(items) = value else {
            return Err(wrong_type(name, "list of strings", value));
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| wrong_type(name, "list of strings", item))
            })
            .collect()
    }
}

fn wrong_type(name: &str, expected: &'static str, found: &Value) -> ArgError {
    ArgError::WrongType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
