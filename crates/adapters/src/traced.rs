// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced transport wrapper for consistent observability

use crate::transport::{
    BatchOp, ContinuationToken, FaultKind, ScanQuery, Segment, Transport, TransportError,
};
use async_trait::async_trait;
use std::time::Instant;
use tabletx_core::{EntityKeys, Row, VersionToken};
use tracing::Instrument;

/// Log the outcome of one store call. Expected outcomes of optimistic
/// concurrency (conflicts, absent rows) stay at debug level.
fn record<T>(result: &Result<T, TransportError>, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::debug!(elapsed_ms, "ok"),
        Err(e) => match e.kind() {
            FaultKind::VersionConflict | FaultKind::NotFound | FaultKind::AlreadyExists => {
                tracing::debug!(elapsed_ms, error = %e, "rejected")
            }
            FaultKind::Timeout | FaultKind::TableMissing => {
                tracing::warn!(elapsed_ms, error = %e, "failed")
            }
            FaultKind::ModificationRejected | FaultKind::Fatal => {
                tracing::error!(elapsed_ms, error = %e, "failed")
            }
        },
    }
}

/// Wrapper that adds tracing to any Transport
#[derive(Clone)]
pub struct TracedTransport<T> {
    inner: T,
}

impl<T> TracedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for TracedTransport<T> {
    async fn create_table(&self, table: &str) -> Result<(), TransportError> {
        let span = tracing::info_span!("store.create_table", table);
        async {
            tracing::info!("creating table");
            let started = Instant::now();
            let result = self.inner.create_table(table).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        let span = tracing::debug_span!("store.insert", table, keys = %row.keys);
        async {
            let started = Instant::now();
            let result = self.inner.insert(table, row).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn replace(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<Row, TransportError> {
        let span =
            tracing::debug_span!("store.replace", table, keys = %row.keys, expected = %expected);
        async {
            let started = Instant::now();
            let result = self.inner.replace(table, row, expected).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        let span = tracing::debug_span!("store.insert_or_replace", table, keys = %row.keys);
        async {
            let started = Instant::now();
            let result = self.inner.insert_or_replace(table, row).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn delete(
        &self,
        table: &str,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<(), TransportError> {
        let span = tracing::debug_span!("store.delete", table, keys = %keys, expected = %expected);
        async {
            let started = Instant::now();
            let result = self.inner.delete(table, keys, expected).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn get(&self, table: &str, keys: &EntityKeys) -> Result<Row, TransportError> {
        let span = tracing::trace_span!("store.get", table, keys = %keys);
        async {
            let started = Instant::now();
            let result = self.inner.get(table, keys).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_batch(
        &self,
        table: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<Option<VersionToken>>, TransportError> {
        let partition = ops
            .first()
            .map(|op| op.keys().partition_key.clone())
            .unwrap_or_default();
        let span = tracing::info_span!("store.batch", table, partition = %partition, size = ops.len());
        async {
            let started = Instant::now();
            let result = self.inner.execute_batch(table, ops).await;
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn scan(
        &self,
        table: &str,
        query: &ScanQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Segment, TransportError> {
        let span = tracing::debug_span!(
            "store.scan",
            table,
            partition = query.partition_key.as_deref().unwrap_or("*"),
            resumed = continuation.is_some()
        );
        async {
            let started = Instant::now();
            let result = self.inner.scan(table, query, continuation).await;
            tracing::trace!(rows = result.as_ref().map(|s| s.rows.len()).ok(), "segment");
            record(&result, started);
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
