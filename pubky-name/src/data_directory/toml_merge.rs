//!
//! Deep merge of two TOML documents, used to layer a user config over the defaults.
//!

use std::fmt;

use toml::{map::Map, Value};

/// Both documents set `path`, but to values of different types.
#[derive(Debug, PartialEq)]
pub struct MergeError {
    pub path: String,
    pub expected: &'static str,
    pub existing: &'static str,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incompatible types at path \"{}\", expected \"{}\" received \"{}\".",
            self.path, self.expected, self.existing
        )
    }
}

impl std::error::Error for MergeError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct Merger {
    /// Replace arrays instead of appending to them.
    pub replace_arrays: bool,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replace_arrays(mut self, replace_arrays: bool) -> Self {
        self.replace_arrays = replace_arrays;
        self
    }

    /// Merge `other` into `value`. Scalars of `other` win, tables are merged key by key.
    pub fn merge(&self, value: Value, other: Value) -> Result<Value, MergeError> {
        self.merge_at(value, other, "$")
    }

    fn merge_at(&self, value: Value, other: Value, path: &str) -> Result<Value, MergeError> {
        match (value, other) {
            (Value::String(_), inner @ Value::String(_))
            | (Value::Integer(_), inner @ Value::Integer(_))
            | (Value::Float(_), inner @ Value::Float(_))
            | (Value::Boolean(_), inner @ Value::Boolean(_))
            | (Value::Datetime(_), inner @ Value::Datetime(_)) => Ok(inner),
            (Value::Array(mut existing), Value::Array(inner)) => {
                if self.replace_arrays {
                    return Ok(Value::Array(inner));
                }
                existing.extend(inner);
                Ok(Value::Array(existing))
            }
            (Value::Table(mut existing), Value::Table(inner)) => {
                self.merge_tables(&mut existing, inner, path)?;
                Ok(Value::Table(existing))
            }
            (v, o) => Err(MergeError {
                path: path.to_owned(),
                expected: v.type_str(),
                existing: o.type_str(),
            }),
        }
    }

    fn merge_tables(
        &self,
        value: &mut Map<String, Value>,
        other: Map<String, Value>,
        path: &str,
    ) -> Result<(), MergeError> {
        for (name, inner) in other {
            let merged = match value.remove(&name) {
                Some(existing) => self.merge_at(existing, inner, &format!("{path}.{name}"))?,
                None => inner,
            };
            value.insert(name, merged);
        }
        Ok(())
    }
}
