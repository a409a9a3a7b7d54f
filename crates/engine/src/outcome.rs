// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcomes of store operations

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use tabletx_core::{from_row, Entity, EntityKeys, Row, VersionToken};

/// An entity as read from or written to the store, with the metadata the
/// store attached to its row
#[derive(Clone, Debug, PartialEq)]
pub struct Stored<E> {
    pub entity: E,
    pub keys: EntityKeys,
    pub version: VersionToken,
    pub timestamp: Option<DateTime<Utc>>,
    /// Lock field, if the row is currently locked
    pub locked_at: Option<DateTime<Utc>>,
}

impl<E> Stored<E> {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn into_entity(self) -> E {
        self.entity
    }
}

impl<E: Entity> Stored<E> {
    /// Map a row read back from the store
    pub(crate) fn from_row(row: Row) -> Result<Self, StoreError> {
        let entity = from_row::<E>(&row)?;
        Self::written(entity, row)
    }

    /// Pair an entity with the row the store returned for its write
    pub(crate) fn written(entity: E, row: Row) -> Result<Self, StoreError> {
        let locked_at = row.locked_at();
        let version = row
            .version
            .ok_or_else(|| StoreError::unversioned(&row.keys))?;
        Ok(Self {
            entity,
            keys: row.keys,
            version,
            timestamp: row.timestamp,
            locked_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome<E> {
    Created(Stored<E>),
    AlreadyExists,
}

impl<E> CreateOutcome<E> {
    pub fn created(self) -> Option<Stored<E>> {
        match self {
            CreateOutcome::Created(stored) => Some(stored),
            CreateOutcome::AlreadyExists => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced(VersionToken),
    VersionConflict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    VersionConflict,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FindOutcome<E> {
    Found(Stored<E>),
    NotFound,
}

impl<E> FindOutcome<E> {
    pub fn found(self) -> Option<Stored<E>> {
        match self {
            FindOutcome::Found(stored) => Some(stored),
            FindOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FindOutcome::Found(_))
    }
}

/// Per-entity outcome of a batch write
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed(VersionToken),
    /// Another entity in the same call had the same keys; the first won
    DuplicateDropped,
    /// The chunk holding this entity failed as a whole; nothing in it was
    /// written
    Rejected { reason: String },
    /// An earlier chunk was rejected, so this entity was never submitted
    NotAttempted,
}

impl BatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, BatchOutcome::Committed(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult<E> {
    pub entity: E,
    pub outcome: BatchOutcome,
}
