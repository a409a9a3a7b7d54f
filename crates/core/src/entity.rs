// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity mapping traits
//!
//! Each entity type states its own mapping at compile time: a [`KeyCodec`]
//! turns its identity into row/partition keys, and [`Entity`] converts it to
//! and from a field map.

use crate::row::{is_reserved_field, FieldValue, Fields, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row key and partition key identifying one row in a table
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKeys {
    pub partition_key: String,
    pub row_key: String,
}

impl EntityKeys {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl std::fmt::Display for EntityKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Errors converting between rows and entities
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("field {field} has type {actual}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("field name is reserved: {0}")]
    ReservedField(String),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Maps an entity identity to its storage keys
pub trait KeyCodec {
    type Id: Clone + Send + Sync + 'static;

    fn encode_keys(id: &Self::Id) -> EntityKeys;
}

/// A record persisted as one row
pub trait Entity: KeyCodec + Clone + Send + Sync + 'static {
    /// Table holding rows of this type
    const TABLE: &'static str;

    fn id(&self) -> Self::Id;

    fn keys(&self) -> EntityKeys {
        Self::encode_keys(&self.id())
    }

    fn row_key(&self) -> String {
        self.keys().row_key
    }

    fn partition_key(&self) -> String {
        self.keys().partition_key
    }

    /// Application fields; must not use reserved names
    fn to_fields(&self) -> Fields;

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError>;

    /// Default value used when a read-modify-write finds no row
    fn blank(id: &Self::Id) -> Self;
}

/// Build an unversioned row from an entity
pub fn to_row<E: Entity>(entity: &E) -> Result<Row, MappingError> {
    let fields = entity.to_fields();
    if let Some(name) = fields.keys().find(|name| is_reserved_field(name)) {
        return Err(MappingError::ReservedField(name.clone()));
    }
    Ok(Row::new(entity.keys(), fields))
}

/// Rebuild an entity from a stored row, ignoring reserved fields
pub fn from_row<E: Entity>(row: &Row) -> Result<E, MappingError> {
    E::from_fields(&row.keys, &row.application_fields())
}

/// Look up a field that must be present
pub fn required<'a>(fields: &'a Fields, name: &str) -> Result<&'a FieldValue, MappingError> {
    fields
        .get(name)
        .ok_or_else(|| MappingError::MissingField(name.to_string()))
}

pub fn required_str(fields: &Fields, name: &str) -> Result<String, MappingError> {
    let value = required(fields, name)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(name, "string", value))
}

pub fn required_i64(fields: &Fields, name: &str) -> Result<i64, MappingError> {
    let value = required(fields, name)?;
    value.as_i64().ok_or_else(|| wrong_type(name, "int", value))
}

pub fn required_bool(fields: &Fields, name: &str) -> Result<bool, MappingError> {
    let value = required(fields, name)?;
    value.as_bool().ok_or_else(|| wrong_type(name, "bool", value))
}

/// Look up a string field that may be absent
pub fn optional_str(fields: &Fields, name: &str) -> Result<Option<String>, MappingError> {
    match fields.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| wrong_type(name, "string", value)),
    }
}

fn wrong_type(name: &str, expected: &'static str, actual: &FieldValue) -> MappingError {
    MappingError::WrongType {
        field: name.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
