// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lazy paginated scans
//!
//! The store returns query results in segments with an opaque
//! continuation token. The scanner exposes them as a single stream that
//! fetches the next segment only once the current one is drained.

use crate::context::StoreContext;
use crate::error::{CallError, StoreError};
use crate::outcome::Stored;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use tabletx_adapters::{ContinuationToken, ScanQuery, Transport, TransportError};
use tabletx_core::{Clock, Entity, Row};

pub struct PaginatedScanner<T, C> {
    ctx: Arc<StoreContext<T, C>>,
}

impl<T, C> Clone for PaginatedScanner<T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T: Transport, C: Clock> PaginatedScanner<T, C> {
    pub(crate) fn new(ctx: Arc<StoreContext<T, C>>) -> Self {
        Self { ctx }
    }

    /// Every entity in one partition, in row key order
    pub fn scan_partition<E: Entity>(
        &self,
        partition_key: impl Into<String>,
    ) -> impl Stream<Item = Result<Stored<E>, StoreError>> + Send + 'static {
        let query = ScanQuery::partition(partition_key, self.ctx.config.scan.page_size);
        self.scan::<E>(query)
    }

    /// Every entity in the table
    pub fn scan_table<E: Entity>(
        &self,
    ) -> impl Stream<Item = Result<Stored<E>, StoreError>> + Send + 'static {
        let query = ScanQuery::table(self.ctx.config.scan.page_size);
        self.scan::<E>(query)
    }

    fn scan<E: Entity>(
        &self,
        query: ScanQuery,
    ) -> impl Stream<Item = Result<Stored<E>, StoreError>> + Send + 'static {
        let cursor = Cursor::<T, C, E> {
            ctx: Arc::clone(&self.ctx),
            query,
            buffer: VecDeque::new(),
            continuation: None,
            done: false,
            _entity: PhantomData,
        };

        stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(row) = cursor.buffer.pop_front() {
                    return Some((Stored::<E>::from_row(row), cursor));
                }
                if cursor.done {
                    return None;
                }
                if let Err(e) = cursor.fetch().await {
                    cursor.done = true;
                    return Some((Err(e), cursor));
                }
            }
        })
    }
}

/// Scan position: rows of the current segment not yet yielded, and the
/// token for the next one
struct Cursor<T, C, E> {
    ctx: Arc<StoreContext<T, C>>,
    query: ScanQuery,
    buffer: VecDeque<Row>,
    continuation: Option<ContinuationToken>,
    done: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<T: Transport, C: Clock, E: Entity> Cursor<T, C, E> {
    /// Fetch the next segment. Transient faults retry this segment only,
    /// so rows already yielded are never repeated.
    async fn fetch(&mut self) -> Result<(), StoreError> {
        let transport = &self.ctx.transport;
        let query = &self.query;
        let continuation = self.continuation.as_ref();
        let table = E::TABLE;
        let result = self
            .ctx
            .call_read(table, "scan", move || {
                transport.scan(table, query, continuation)
            })
            .await;

        match result {
            Ok(segment) => {
                tracing::trace!(
                    table,
                    rows = segment.rows.len(),
                    more = segment.continuation.is_some(),
                    "segment fetched"
                );
                self.buffer.extend(segment.rows);
                self.done = segment.continuation.is_none();
                self.continuation = segment.continuation;
                Ok(())
            }
            Err(CallError::Fault(TransportError::TableMissing(_))) => {
                tracing::debug!(table, "scan of missing table");
                self.done = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
