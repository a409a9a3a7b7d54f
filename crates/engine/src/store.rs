// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed CRUD over one table per entity type
//!
//! Single-row writes are conditional: `create` only succeeds on an absent
//! row, `replace` and `delete` only against the version the caller read.
//! `create_or_update` composes those into a read-modify-write loop that
//! retries on contention until it wins.

use crate::context::StoreContext;
use crate::error::{CallError, StoreError};
use crate::outcome::{CreateOutcome, DeleteOutcome, FindOutcome, ReplaceOutcome, Stored};
use std::sync::Arc;
use tabletx_adapters::{Transport, TransportError};
use tabletx_core::{to_row, Clock, Entity, EntityKeys, MappingError, Row, VersionToken};

pub struct EntityStore<T, C> {
    pub(crate) ctx: Arc<StoreContext<T, C>>,
}

impl<T, C> Clone for EntityStore<T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T: Transport, C: Clock> EntityStore<T, C> {
    pub(crate) fn new(ctx: Arc<StoreContext<T, C>>) -> Self {
        Self { ctx }
    }

    /// Insert a new row; an existing row with the same keys is left alone
    pub async fn create<E: Entity>(&self, entity: &E) -> Result<CreateOutcome<E>, StoreError> {
        let row = to_row(entity)?;
        self.ctx.validate_write(E::TABLE, &row)?;
        match self.insert_row(E::TABLE, row).await {
            Ok(row) => Ok(CreateOutcome::Created(Stored::written(entity.clone(), row)?)),
            Err(CallError::Fault(TransportError::AlreadyExists(_))) => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the row if it is still at `expected`. The written row
    /// carries only the entity's fields, so any lock is cleared.
    pub async fn replace<E: Entity>(
        &self,
        entity: &E,
        expected: &VersionToken,
    ) -> Result<ReplaceOutcome, StoreError> {
        let row = to_row(entity)?;
        self.ctx.validate_write(E::TABLE, &row)?;
        self.replace_checked(E::TABLE, row, expected).await
    }

    /// Write back a previously read entity at its read version, keeping
    /// the row's lock field as it was read
    pub async fn replace_stored<E: Entity>(
        &self,
        stored: &Stored<E>,
    ) -> Result<ReplaceOutcome, StoreError> {
        let row = keyed_row(&stored.entity, &stored.keys)?.with_lock(stored.locked_at);
        self.ctx.validate_write(E::TABLE, &row)?;
        self.replace_checked(E::TABLE, row, &stored.version).await
    }

    /// Unconditional upsert
    pub async fn insert_or_replace<E: Entity>(&self, entity: &E) -> Result<Stored<E>, StoreError> {
        let row = to_row(entity)?;
        self.ctx.validate_write(E::TABLE, &row)?;
        let transport = &self.ctx.transport;
        let table = E::TABLE;
        let written = self
            .ctx
            .call_write(table, "insert_or_replace", move || {
                transport.insert_or_replace(table, row.clone())
            })
            .await?;
        Stored::written(entity.clone(), written)
    }

    /// Delete the row if it is still at `expected`
    pub async fn delete<E: Entity>(
        &self,
        entity: &E,
        expected: &VersionToken,
    ) -> Result<DeleteOutcome, StoreError> {
        self.delete_by_id::<E>(&entity.keys(), expected).await
    }

    pub async fn delete_by_id<E: Entity>(
        &self,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<DeleteOutcome, StoreError> {
        let transport = &self.ctx.transport;
        let table = E::TABLE;
        let result = self
            .ctx
            .call_read(table, "delete", move || transport.delete(table, keys, expected))
            .await;
        match result {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(CallError::Fault(
                TransportError::NotFound(_) | TransportError::TableMissing(_),
            )) => Ok(DeleteOutcome::NotFound),
            Err(CallError::Fault(TransportError::VersionConflict(_))) => {
                Ok(DeleteOutcome::VersionConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point read by keys
    pub async fn find_by_id<E: Entity>(
        &self,
        keys: &EntityKeys,
    ) -> Result<FindOutcome<E>, StoreError> {
        match self.read_row(E::TABLE, keys).await? {
            Some(row) => Ok(FindOutcome::Found(Stored::from_row(row)?)),
            None => Ok(FindOutcome::NotFound),
        }
    }

    /// Point read by entity id
    pub async fn find<E: Entity>(&self, id: &E::Id) -> Result<FindOutcome<E>, StoreError> {
        self.find_by_id(&E::encode_keys(id)).await
    }

    /// Apply `mutate` to the current entity, or to a blank one if absent,
    /// and write it back conditionally, retrying until no other writer
    /// intervened. `mutate` may run more than once.
    ///
    /// A lock held on the row is preserved across the write.
    pub async fn create_or_update<E, F>(
        &self,
        id: &E::Id,
        mut mutate: F,
    ) -> Result<Stored<E>, StoreError>
    where
        E: Entity,
        F: FnMut(&mut E) + Send,
    {
        let keys = E::encode_keys(id);
        let mut conflicts = self.ctx.conflicts();

        loop {
            let written = match self.read_row(E::TABLE, &keys).await? {
                Some(row) => {
                    let current = Stored::<E>::from_row(row)?;
                    let mut entity = current.entity;
                    mutate(&mut entity);
                    let row = keyed_row(&entity, &keys)?.with_lock(current.locked_at);
                    self.ctx.validate_write(E::TABLE, &row)?;
                    match self.replace_row(E::TABLE, row, &current.version).await? {
                        Some(row) => Some(Stored::written(entity, row)?),
                        None => None,
                    }
                }
                None => {
                    let mut entity = E::blank(id);
                    mutate(&mut entity);
                    let row = keyed_row(&entity, &keys)?;
                    self.ctx.validate_write(E::TABLE, &row)?;
                    match self.insert_row(E::TABLE, row).await {
                        Ok(row) => Some(Stored::written(entity, row)?),
                        Err(CallError::Fault(TransportError::AlreadyExists(_))) => None,
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            match written {
                Some(stored) => return Ok(stored),
                None => conflicts.wait(&keys).await?,
            }
        }
    }

    async fn replace_checked(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<ReplaceOutcome, StoreError> {
        match self.replace_row(table, row, expected).await? {
            Some(row) => {
                let version = row.version.ok_or_else(|| StoreError::unversioned(&row.keys))?;
                Ok(ReplaceOutcome::Replaced(version))
            }
            None => Ok(ReplaceOutcome::VersionConflict),
        }
    }

    /// Read one row; absent rows and tables read as `None`
    pub(crate) async fn read_row(
        &self,
        table: &str,
        keys: &EntityKeys,
    ) -> Result<Option<Row>, StoreError> {
        let transport = &self.ctx.transport;
        let result = self
            .ctx
            .call_read(table, "get", move || transport.get(table, keys))
            .await;
        match result {
            Ok(row) => Ok(Some(row)),
            Err(CallError::Fault(
                TransportError::NotFound(_) | TransportError::TableMissing(_),
            )) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Conditional replace; `None` when the version moved or the row is gone
    pub(crate) async fn replace_row(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<Option<Row>, StoreError> {
        let transport = &self.ctx.transport;
        let result = self
            .ctx
            .call_read(table, "replace", move || {
                transport.replace(table, row.clone(), expected)
            })
            .await;
        match result {
            Ok(row) => Ok(Some(row)),
            Err(CallError::Fault(
                TransportError::VersionConflict(_)
                | TransportError::NotFound(_)
                | TransportError::TableMissing(_),
            )) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_row(&self, table: &str, row: Row) -> Result<Row, CallError> {
        let transport = &self.ctx.transport;
        self.ctx
            .call_write(table, "insert", move || transport.insert(table, row.clone()))
            .await
    }
}

/// Row for `entity`, which must still map to `keys`
fn keyed_row<E: Entity>(entity: &E, keys: &EntityKeys) -> Result<Row, StoreError> {
    let row = to_row(entity)?;
    if &row.keys != keys {
        return Err(MappingError::Invalid {
            field: "keys".to_string(),
            message: format!("entity moved from {keys} to {}", row.keys),
        }
        .into());
    }
    Ok(row)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
