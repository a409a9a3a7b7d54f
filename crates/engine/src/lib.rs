// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tabletx storage engine
//!
//! Transaction-like guarantees over a partitioned table store that only
//! offers single-row compare-and-swap: typed CRUD with optimistic
//! concurrency, partition-aware batching, lazy paginated scans, row locks
//! and compensating sagas.

mod batch;
mod context;
mod engine;
mod error;
mod lock;
mod outcome;
mod saga;
mod scan;
mod store;

#[cfg(test)]
mod test_support;

pub use batch::BatchWriter;
pub use context::WriteValidator;
pub use engine::{EngineBuilder, TableEngine};
pub use error::StoreError;
pub use lock::{
    AbandonAfter, AlreadyLockedPolicy, BoxError, ForceUnlockAfter, KeepRetrying, LockContention,
    LockCoordinator, LockDecision, LockError, LockHandle, LockOptions, Released,
};
pub use outcome::{
    BatchOutcome, BatchResult, CreateOutcome, DeleteOutcome, FindOutcome, ReplaceOutcome, Stored,
};
pub use saga::{CompensationFailure, Saga, SagaReport, SagaState};
pub use scan::PaginatedScanner;
pub use store::EntityStore;
