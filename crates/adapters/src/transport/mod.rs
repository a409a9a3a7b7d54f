// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table store transport
//!
//! A transport executes exactly one store operation per call and reports
//! failure as a classified [`TransportError`]. It never retries; retry and
//! recovery decisions belong to the engine.

mod memory;

pub use memory::MemoryTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, OpKind, TransportCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tabletx_core::{EntityKeys, Row, VersionToken};
use thiserror::Error;

/// Fault classes the engine distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NotFound,
    AlreadyExists,
    VersionConflict,
    Timeout,
    TableMissing,
    ModificationRejected,
    Fatal,
}

/// Classified failure of a single store operation
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("row already exists: {0}")]
    AlreadyExists(String),
    #[error("version conflict: {0}")]
    VersionConflict(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("table not found: {0}")]
    TableMissing(String),
    #[error("modification rejected: {0}")]
    ModificationRejected(String),
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
    #[error("transport failure: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn kind(&self) -> FaultKind {
        match self {
            TransportError::NotFound(_) => FaultKind::NotFound,
            TransportError::AlreadyExists(_) => FaultKind::AlreadyExists,
            TransportError::VersionConflict(_) => FaultKind::VersionConflict,
            TransportError::Timeout(_) => FaultKind::Timeout,
            TransportError::TableMissing(_) => FaultKind::TableMissing,
            TransportError::ModificationRejected(_) => FaultKind::ModificationRejected,
            TransportError::InvalidBatch(_) | TransportError::Fatal(_) => FaultKind::Fatal,
        }
    }
}

/// Opaque cursor returned by a segmented scan
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which rows a scan covers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanQuery {
    /// Restrict to one partition; `None` scans the whole table
    pub partition_key: Option<String>,
    /// Rows per segment
    pub page_size: usize,
}

impl ScanQuery {
    pub fn partition(partition_key: impl Into<String>, page_size: usize) -> Self {
        Self {
            partition_key: Some(partition_key.into()),
            page_size,
        }
    }

    pub fn table(page_size: usize) -> Self {
        Self {
            partition_key: None,
            page_size,
        }
    }
}

/// One page of scan results
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segment {
    pub rows: Vec<Row>,
    /// Present when more rows may follow
    pub continuation: Option<ContinuationToken>,
}

/// One operation inside a partition batch
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOp {
    Insert(Row),
    InsertOrReplace(Row),
    Replace { row: Row, expected: VersionToken },
    Delete {
        keys: EntityKeys,
        expected: VersionToken,
    },
}

impl BatchOp {
    pub fn keys(&self) -> &EntityKeys {
        match self {
            BatchOp::Insert(row) | BatchOp::InsertOrReplace(row) | BatchOp::Replace { row, .. } => {
                &row.keys
            }
            BatchOp::Delete { keys, .. } => keys,
        }
    }
}

/// Executes single store operations against a partitioned table store
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Create a table; succeeds if it already exists
    async fn create_table(&self, table: &str) -> Result<(), TransportError>;

    /// Insert a new row; fails with `AlreadyExists` if the keys are taken
    async fn insert(&self, table: &str, row: Row) -> Result<Row, TransportError>;

    /// Replace a row only if its version still matches `expected`
    async fn replace(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<Row, TransportError>;

    /// Unconditional upsert
    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<Row, TransportError>;

    /// Delete a row only if its version still matches `expected`
    async fn delete(
        &self,
        table: &str,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<(), TransportError>;

    /// Point read
    async fn get(&self, table: &str, keys: &EntityKeys) -> Result<Row, TransportError>;

    /// Apply all operations atomically. Every operation must share one
    /// partition key. Returns the new version per operation (`None` for
    /// deletes), in input order.
    async fn execute_batch(
        &self,
        table: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<Option<VersionToken>>, TransportError>;

    /// Fetch one segment of rows in key order
    async fn scan(
        &self,
        table: &str,
        query: &ScanQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Segment, TransportError>;
}
