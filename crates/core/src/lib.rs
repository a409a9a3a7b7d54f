// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tabletx-core: shared model for the tabletx storage engine
//!
//! This crate provides:
//! - Entity and key codec traits (compile-time row mapping)
//! - The logical row layout, version tokens and the reserved lock field
//! - Transient and contention retry policies
//! - Engine configuration and a testable clock

pub mod clock;
pub mod config;
pub mod entity;
pub mod keys;
pub mod retry;
pub mod row;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{BatchConfig, BatchMode, ConfigError, EngineConfig, LockConfig, ScanConfig};
pub use entity::{from_row, to_row, Entity, EntityKeys, KeyCodec, MappingError};
pub use keys::{bucket_partition, bucketed_keys, validate_keys, KeyError};
pub use retry::{ContentionBackoff, ContentionRetry, RetryPolicy, TransientBackoff, TransientRetry};
pub use row::{FieldValue, Fields, Row, VersionToken, LOCK_FIELD, MAX_BATCH_SIZE};
