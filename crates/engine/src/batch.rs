// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched writes
//!
//! The store commits a batch atomically only when every row shares one
//! partition key and no row key repeats, up to [`MAX_BATCH_SIZE`] rows.
//! The writer groups entities by partition, drops duplicates (first
//! occurrence wins) and submits each partition in chunks. Chunks are
//! independent transactions: a rejected chunk leaves earlier ones
//! committed and stops the batch, and every entity's outcome is still
//! reported.
//!
//! [`MAX_BATCH_SIZE`]: tabletx_core::MAX_BATCH_SIZE

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::outcome::{BatchOutcome, BatchResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tabletx_adapters::{BatchOp, Transport};
use tabletx_core::{to_row, BatchMode, Clock, Entity, Row, VersionToken};

pub struct BatchWriter<T, C> {
    ctx: Arc<StoreContext<T, C>>,
}

impl<T, C> Clone for BatchWriter<T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

/// Rows of one partition, in input order
struct PartitionGroup {
    partition_key: String,
    /// Input index and row of each entity kept for submission
    rows: Vec<(usize, Row)>,
}

impl<T: Transport, C: Clock> BatchWriter<T, C> {
    pub(crate) fn new(ctx: Arc<StoreContext<T, C>>) -> Self {
        Self { ctx }
    }

    /// Write `entities`, returning one result per input entity in input
    /// order. A failed chunk shows up in the results, not as an error;
    /// `Err` means nothing was submitted.
    pub async fn write_batch<E: Entity>(
        &self,
        entities: impl IntoIterator<Item = E>,
    ) -> Result<Vec<BatchResult<E>>, StoreError> {
        let entities: Vec<E> = entities.into_iter().collect();
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let mut outcomes: Vec<Option<BatchOutcome>> = vec![None; entities.len()];
        let groups = self.group(&entities, &mut outcomes)?;
        let max = self.ctx.config.batch.max_batch_size;
        let mut committed = 0;
        let mut rejected = false;

        for group in groups {
            for chunk in group.rows.chunks(max) {
                if rejected {
                    for (index, _) in chunk {
                        outcomes[*index] = Some(BatchOutcome::NotAttempted);
                    }
                    continue;
                }
                match self.submit::<E>(&group.partition_key, chunk).await {
                    Ok(versions) => {
                        for ((index, _), version) in chunk.iter().zip(versions) {
                            if let Some(version) = version {
                                outcomes[*index] = Some(BatchOutcome::Committed(version));
                            }
                        }
                        committed += chunk.len();
                    }
                    Err(e) => {
                        tracing::error!(
                            table = E::TABLE,
                            partition = %group.partition_key,
                            committed,
                            error = %e,
                            "batch chunk rejected, skipping the rest of the batch"
                        );
                        let reason = e.to_string();
                        for (index, _) in chunk {
                            outcomes[*index] = Some(BatchOutcome::Rejected {
                                reason: reason.clone(),
                            });
                        }
                        rejected = true;
                    }
                }
            }
        }

        entities
            .into_iter()
            .zip(outcomes)
            .map(|(entity, outcome)| {
                let outcome = outcome.ok_or_else(|| {
                    StoreError::unversioned(format!("{} in batch", entity.keys()))
                })?;
                Ok(BatchResult { entity, outcome })
            })
            .collect()
    }

    /// Group rows by partition in first-seen order, marking duplicates.
    /// Every row is mapped and validated before anything is submitted.
    fn group<E: Entity>(
        &self,
        entities: &[E],
        outcomes: &mut [Option<BatchOutcome>],
    ) -> Result<Vec<PartitionGroup>, StoreError> {
        let mut groups: Vec<PartitionGroup> = Vec::new();
        let mut by_partition: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for (index, entity) in entities.iter().enumerate() {
            let row = to_row(entity)?;
            self.ctx.validate_write(E::TABLE, &row)?;

            let key = (row.keys.partition_key.clone(), row.keys.row_key.clone());
            if !seen.insert(key) {
                tracing::warn!(
                    table = E::TABLE,
                    keys = %row.keys,
                    "duplicate row in batch, keeping first occurrence"
                );
                outcomes[index] = Some(BatchOutcome::DuplicateDropped);
                continue;
            }

            let slot = *by_partition
                .entry(row.keys.partition_key.clone())
                .or_insert_with(|| {
                    groups.push(PartitionGroup {
                        partition_key: row.keys.partition_key.clone(),
                        rows: Vec::new(),
                    });
                    groups.len() - 1
                });
            groups[slot].rows.push((index, row));
        }
        Ok(groups)
    }

    async fn submit<E: Entity>(
        &self,
        partition_key: &str,
        chunk: &[(usize, Row)],
    ) -> Result<Vec<Option<VersionToken>>, StoreError> {
        let mode = self.ctx.config.batch.mode;
        let ops: Vec<BatchOp> = chunk
            .iter()
            .map(|(_, row)| match mode {
                BatchMode::InsertOrReplace => BatchOp::InsertOrReplace(row.clone()),
                BatchMode::Insert => BatchOp::Insert(row.clone()),
            })
            .collect();

        tracing::debug!(
            table = E::TABLE,
            partition = partition_key,
            size = ops.len(),
            "submitting batch chunk"
        );

        let transport = &self.ctx.transport;
        let table = E::TABLE;
        self.ctx
            .call_write(table, "batch", move || {
                transport.execute_batch(table, ops.clone())
            })
            .await
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
