// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process table store
//!
//! Implements the full transport contract in memory: per-row version tokens,
//! conditional writes, atomic single-partition batches and key-ordered
//! segmented scans. Clones share the same tables.

use super::{BatchOp, ContinuationToken, ScanQuery, Segment, Transport, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, Mutex};
use tabletx_core::{EntityKeys, Row, VersionToken, MAX_BATCH_SIZE};

type Table = BTreeMap<EntityKeys, Row>;

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Table>,
    next_version: u64,
}

impl MemoryState {
    fn table(&self, name: &str) -> Result<&Table, TransportError> {
        self.tables
            .get(name)
            .ok_or_else(|| TransportError::TableMissing(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, TransportError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| TransportError::TableMissing(name.to_string()))
    }

    fn next_version(&mut self) -> VersionToken {
        self.next_version += 1;
        VersionToken::new(format!("W/\"{}\"", self.next_version))
    }

    /// Stamp a row with fresh metadata and store it
    fn write(&mut self, table: &str, mut row: Row) -> Result<Row, TransportError> {
        let version = self.next_version();
        let rows = self.table_mut(table)?;
        row.version = Some(version);
        row.timestamp = Some(Utc::now());
        rows.insert(row.keys.clone(), row.clone());
        Ok(row)
    }

    fn check_insert(&self, table: &str, keys: &EntityKeys) -> Result<(), TransportError> {
        if self.table(table)?.contains_key(keys) {
            return Err(TransportError::AlreadyExists(keys.to_string()));
        }
        Ok(())
    }

    fn check_version(
        &self,
        table: &str,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<(), TransportError> {
        let current = self
            .table(table)?
            .get(keys)
            .ok_or_else(|| TransportError::NotFound(keys.to_string()))?;
        if current.version.as_ref() != Some(expected) {
            return Err(TransportError::VersionConflict(format!(
                "{keys}: expected {expected}"
            )));
        }
        Ok(())
    }

    fn check_batch_op(&self, table: &str, op: &BatchOp) -> Result<(), TransportError> {
        match op {
            BatchOp::Insert(row) => self.check_insert(table, &row.keys),
            BatchOp::InsertOrReplace(_) => Ok(()),
            BatchOp::Replace { row, expected } => self.check_version(table, &row.keys, expected),
            BatchOp::Delete { keys, expected } => self.check_version(table, keys, expected),
        }
    }
}

fn validate_batch(ops: &[BatchOp]) -> Result<(), TransportError> {
    let Some(first) = ops.first() else {
        return Err(TransportError::InvalidBatch("batch is empty".to_string()));
    };
    if ops.len() > MAX_BATCH_SIZE {
        return Err(TransportError::InvalidBatch(format!(
            "batch has {} operations, limit is {MAX_BATCH_SIZE}",
            ops.len()
        )));
    }
    let partition = &first.keys().partition_key;
    let mut seen = HashSet::new();
    for op in ops {
        let keys = op.keys();
        if &keys.partition_key != partition {
            return Err(TransportError::InvalidBatch(format!(
                "mixed partition keys: {partition} and {}",
                keys.partition_key
            )));
        }
        if !seen.insert(&keys.row_key) {
            return Err(TransportError::InvalidBatch(format!(
                "duplicate row key in batch: {}",
                keys.row_key
            )));
        }
    }
    Ok(())
}

fn encode_token(keys: &EntityKeys) -> Result<ContinuationToken, TransportError> {
    serde_json::to_string(keys)
        .map(ContinuationToken::new)
        .map_err(|e| TransportError::Fatal(format!("encode continuation token: {e}")))
}

fn decode_token(token: &ContinuationToken) -> Result<EntityKeys, TransportError> {
    serde_json::from_str(token.as_str())
        .map_err(|e| TransportError::Fatal(format!("invalid continuation token: {e}")))
}

/// Table store held in process memory
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the named table already created
    pub fn with_table(self, table: &str) -> Self {
        self.ensure_table(table);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ensure_table(&self, table: &str) {
        self.lock().tables.entry(table.to_string()).or_default();
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// Current row, if present
    pub fn row(&self, table: &str, keys: &EntityKeys) -> Option<Row> {
        self.lock()
            .tables
            .get(table)
            .and_then(|rows| rows.get(keys))
            .cloned()
    }

    /// All rows of a table in key order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Unconditional upsert without going through the async contract,
    /// creating the table if needed. Useful for seeding and for simulating
    /// a concurrent writer.
    pub fn put(&self, table: &str, row: Row) -> Row {
        let mut state = self.lock();
        state.tables.entry(table.to_string()).or_default();
        let version = state.next_version();
        let mut row = row;
        row.version = Some(version);
        row.timestamp = Some(Utc::now());
        if let Some(rows) = state.tables.get_mut(table) {
            rows.insert(row.keys.clone(), row.clone());
        }
        row
    }

    fn scan_now(
        &self,
        table: &str,
        query: &ScanQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Segment, TransportError> {
        let state = self.lock();
        let rows = state.table(table)?;

        let lower = match (continuation, &query.partition_key) {
            (Some(token), _) => Bound::Excluded(decode_token(token)?),
            (None, Some(partition)) => Bound::Included(EntityKeys::new(partition.clone(), "")),
            (None, None) => Bound::Unbounded,
        };

        let page_size = query.page_size.max(1);
        let mut matching = rows
            .range((lower, Bound::Unbounded))
            .map(|(_, row)| row)
            .take_while(|row| {
                query
                    .partition_key
                    .as_ref()
                    .is_none_or(|p| &row.keys.partition_key == p)
            });

        let page: Vec<Row> = matching.by_ref().take(page_size).cloned().collect();
        let more = matching.next().is_some();
        let continuation = match (more, page.last()) {
            (true, Some(last)) => Some(encode_token(&last.keys)?),
            _ => None,
        };

        Ok(Segment {
            rows: page,
            continuation,
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn create_table(&self, table: &str) -> Result<(), TransportError> {
        self.ensure_table(table);
        Ok(())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        let mut state = self.lock();
        state.check_insert(table, &row.keys)?;
        state.write(table, row)
    }

    async fn replace(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<Row, TransportError> {
        let mut state = self.lock();
        state.check_version(table, &row.keys, expected)?;
        state.write(table, row)
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        self.lock().write(table, row)
    }

    async fn delete(
        &self,
        table: &str,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.check_version(table, keys, expected)?;
        state.table_mut(table)?.remove(keys);
        Ok(())
    }

    async fn get(&self, table: &str, keys: &EntityKeys) -> Result<Row, TransportError> {
        self.lock()
            .table(table)?
            .get(keys)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(keys.to_string()))
    }

    async fn execute_batch(
        &self,
        table: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<Option<VersionToken>>, TransportError> {
        validate_batch(&ops)?;
        let mut state = self.lock();

        // Every condition is checked before anything is applied
        for op in &ops {
            state.check_batch_op(table, op)?;
        }

        let mut versions = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BatchOp::Insert(row)
                | BatchOp::InsertOrReplace(row)
                | BatchOp::Replace { row, .. } => {
                    let written = state.write(table, row)?;
                    versions.push(written.version);
                }
                BatchOp::Delete { keys, .. } => {
                    state.table_mut(table)?.remove(&keys);
                    versions.push(None);
                }
            }
        }
        Ok(versions)
    }

    async fn scan(
        &self,
        table: &str,
        query: &ScanQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Segment, TransportError> {
        self.scan_now(table, query, continuation)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
