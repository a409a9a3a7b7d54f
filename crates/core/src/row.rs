// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical row layout shared by the engine and every transport
//!
//! A row is the pair of keys, the application fields, and the metadata the
//! store assigns (version token, timestamp). The lock field is an ordinary
//! field under a reserved name; only the lock coordinator gives it meaning.

use crate::entity::EntityKeys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved field holding the lock timestamp
pub const LOCK_FIELD: &str = "_locked_at";

/// Maximum number of operations the store accepts in one batch
pub const MAX_BATCH_SIZE: usize = 100;

/// Opaque per-row version token (ETag equivalent)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single typed field value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl FieldValue {
    /// Name of the variant, used in mapping diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Int(_) => "int",
            FieldValue::Double(_) => "double",
            FieldValue::Bool(_) => "bool",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Binary(_) => "binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(n) => Some(*n),
            FieldValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// Field name to value, ordered for stable diffs and logs
pub type Fields = BTreeMap<String, FieldValue>;

/// Whether a field name is reserved for storage metadata
pub fn is_reserved_field(name: &str) -> bool {
    name == LOCK_FIELD
}

/// A row as exchanged with the transport
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub keys: EntityKeys,
    pub fields: Fields,
    /// Assigned by the store; `None` on rows not yet written
    pub version: Option<VersionToken>,
    /// Last-modified time assigned by the store
    pub timestamp: Option<DateTime<Utc>>,
}

impl Row {
    pub fn new(keys: EntityKeys, fields: Fields) -> Self {
        Self {
            keys,
            fields,
            version: None,
            timestamp: None,
        }
    }

    /// Timestamp stored in the lock field, if the row is locked
    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.fields.get(LOCK_FIELD).and_then(FieldValue::as_timestamp)
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at().is_some()
    }

    /// Set or clear the lock field
    pub fn with_lock(mut self, locked_at: Option<DateTime<Utc>>) -> Self {
        match locked_at {
            Some(at) => {
                self.fields
                    .insert(LOCK_FIELD.to_string(), FieldValue::Timestamp(at));
            }
            None => {
                self.fields.remove(LOCK_FIELD);
            }
        }
        self
    }

    /// Fields excluding reserved metadata
    pub fn application_fields(&self) -> Fields {
        self.fields
            .iter()
            .filter(|(name, _)| !is_reserved_field(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "row_tests.rs"]
mod tests;
