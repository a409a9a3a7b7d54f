// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake transport for testing
//!
//! Wraps a [`MemoryTransport`], records every call, and lets tests script
//! faults or run a hook (a simulated concurrent writer) before the next
//! operation of a given kind.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    BatchOp, ContinuationToken, MemoryTransport, ScanQuery, Segment, Transport, TransportError,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tabletx_core::{EntityKeys, Row, VersionToken};

/// Operation kinds faults and hooks can target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    CreateTable,
    Insert,
    Replace,
    InsertOrReplace,
    Delete,
    Get,
    ExecuteBatch,
    Scan,
}

/// Recorded transport call
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCall {
    CreateTable {
        table: String,
    },
    Insert {
        table: String,
        keys: EntityKeys,
    },
    Replace {
        table: String,
        keys: EntityKeys,
        expected: VersionToken,
    },
    InsertOrReplace {
        table: String,
        keys: EntityKeys,
    },
    Delete {
        table: String,
        keys: EntityKeys,
    },
    Get {
        table: String,
        keys: EntityKeys,
    },
    ExecuteBatch {
        table: String,
        partition_key: String,
        size: usize,
    },
    Scan {
        table: String,
        partition_key: Option<String>,
        resumed: bool,
    },
}

impl TransportCall {
    pub fn kind(&self) -> OpKind {
        match self {
            TransportCall::CreateTable { .. } => OpKind::CreateTable,
            TransportCall::Insert { .. } => OpKind::Insert,
            TransportCall::Replace { .. } => OpKind::Replace,
            TransportCall::InsertOrReplace { .. } => OpKind::InsertOrReplace,
            TransportCall::Delete { .. } => OpKind::Delete,
            TransportCall::Get { .. } => OpKind::Get,
            TransportCall::ExecuteBatch { .. } => OpKind::ExecuteBatch,
            TransportCall::Scan { .. } => OpKind::Scan,
        }
    }
}

type Hook = Box<dyn FnOnce(&MemoryTransport) + Send>;

#[derive(Default)]
struct Script {
    faults: HashMap<OpKind, VecDeque<TransportError>>,
    hooks: HashMap<OpKind, VecDeque<Hook>>,
}

/// Fake transport for testing
#[derive(Clone, Default)]
pub struct FakeTransport {
    store: MemoryTransport,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    script: Arc<Mutex<Script>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake over an existing store (shares its tables)
    pub fn over(store: MemoryTransport) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Backing store, for seeding and inspection
    pub fn store(&self) -> &MemoryTransport {
        &self.store
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded calls of one kind
    pub fn calls_of(&self, kind: OpKind) -> Vec<TransportCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.kind() == kind)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Fail the next call of `kind` with `error`
    pub fn fail_next(&self, kind: OpKind, error: TransportError) {
        self.fail_times(kind, error, 1);
    }

    /// Fail the next `times` calls of `kind` with `error`
    pub fn fail_times(&self, kind: OpKind, error: TransportError, times: usize) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let queue = script.faults.entry(kind).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Run `hook` against the backing store just before the next call of `kind`
    pub fn before_next(&self, kind: OpKind, hook: impl FnOnce(&MemoryTransport) + Send + 'static) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .hooks
            .entry(kind)
            .or_default()
            .push_back(Box::new(hook));
    }

    /// Record the call, run any pending hook, and pop any scripted fault
    fn enter(&self, call: TransportCall) -> Result<(), TransportError> {
        let kind = call.kind();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let (hook, fault) = {
            let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
            let hook = script.hooks.get_mut(&kind).and_then(VecDeque::pop_front);
            let fault = script.faults.get_mut(&kind).and_then(VecDeque::pop_front);
            (hook, fault)
        };

        if let Some(hook) = hook {
            hook(&self.store);
        }
        match fault {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn create_table(&self, table: &str) -> Result<(), TransportError> {
        self.enter(TransportCall::CreateTable {
            table: table.to_string(),
        })?;
        self.store.create_table(table).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        self.enter(TransportCall::Insert {
            table: table.to_string(),
            keys: row.keys.clone(),
        })?;
        self.store.insert(table, row).await
    }

    async fn replace(
        &self,
        table: &str,
        row: Row,
        expected: &VersionToken,
    ) -> Result<Row, TransportError> {
        self.enter(TransportCall::Replace {
            table: table.to_string(),
            keys: row.keys.clone(),
            expected: expected.clone(),
        })?;
        self.store.replace(table, row, expected).await
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<Row, TransportError> {
        self.enter(TransportCall::InsertOrReplace {
            table: table.to_string(),
            keys: row.keys.clone(),
        })?;
        self.store.insert_or_replace(table, row).await
    }

    async fn delete(
        &self,
        table: &str,
        keys: &EntityKeys,
        expected: &VersionToken,
    ) -> Result<(), TransportError> {
        self.enter(TransportCall::Delete {
            table: table.to_string(),
            keys: keys.clone(),
        })?;
        self.store.delete(table, keys, expected).await
    }

    async fn get(&self, table: &str, keys: &EntityKeys) -> Result<Row, TransportError> {
        self.enter(TransportCall::Get {
            table: table.to_string(),
            keys: keys.clone(),
        })?;
        self.store.get(table, keys).await
    }

    async fn execute_batch(
        &self,
        table: &str,
        ops: Vec<BatchOp>,
    ) -> Result<Vec<Option<VersionToken>>, TransportError> {
        self.enter(TransportCall::ExecuteBatch {
            table: table.to_string(),
            partition_key: ops
                .first()
                .map(|op| op.keys().partition_key.clone())
                .unwrap_or_default(),
            size: ops.len(),
        })?;
        self.store.execute_batch(table, ops).await
    }

    async fn scan(
        &self,
        table: &str,
        query: &ScanQuery,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Segment, TransportError> {
        self.enter(TransportCall::Scan {
            table: table.to_string(),
            partition_key: query.partition_key.clone(),
            resumed: continuation.is_some(),
        })?;
        self.store.scan(table, query, continuation).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
