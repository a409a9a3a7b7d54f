// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for engine operations

use std::time::Duration;
use tabletx_adapters::TransportError;
use tabletx_core::{KeyError, MappingError};
use thiserror::Error;

/// Failure of a store operation after the engine's own retries
///
/// Expected outcomes of optimistic concurrency (conflicts, absent rows,
/// duplicate inserts) are not errors; they come back as outcome enums.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("deadline of {deadline:?} exceeded after {attempts} attempts")]
    DeadlineExceeded { deadline: Duration, attempts: u32 },
    #[error("modification rejected: {0}")]
    ModificationRejected(String),
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),
    #[error("lock on {0} was lost before release")]
    LockLost(String),
    #[error("store fault: {0}")]
    Fatal(#[source] TransportError),
}

impl StoreError {
    /// Classify a fault the engine does not handle itself
    pub(crate) fn from_fault(fault: TransportError) -> Self {
        match fault {
            TransportError::ModificationRejected(message) => {
                StoreError::ModificationRejected(message)
            }
            other => StoreError::Fatal(other),
        }
    }

    /// Missing version token on a row the store claims to have written
    pub(crate) fn unversioned(keys: impl std::fmt::Display) -> Self {
        StoreError::Fatal(TransportError::Fatal(format!(
            "store returned row {keys} without a version token"
        )))
    }
}

/// Result of one engine call: either already classified, or a raw fault
/// for the caller to turn into an outcome
#[derive(Debug)]
pub(crate) enum CallError {
    Store(StoreError),
    Fault(TransportError),
}

impl From<StoreError> for CallError {
    fn from(error: StoreError) -> Self {
        CallError::Store(error)
    }
}

impl From<CallError> for StoreError {
    fn from(error: CallError) -> Self {
        match error {
            CallError::Store(error) => error,
            CallError::Fault(fault) => StoreError::from_fault(fault),
        }
    }
}
