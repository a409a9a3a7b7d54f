// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key helpers for entity key codecs

use crate::entity::EntityKeys;
use thiserror::Error;

/// Longest key the store accepts, in bytes
pub const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,
    #[error("key exceeds {MAX_KEY_LEN} bytes: {0} bytes")]
    TooLong(usize),
    #[error("key contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

/// Derive a partition key from a row key by hashing it into `buckets` buckets.
///
/// The mapping is deterministic, so a point read can recompute the
/// partition from the row key alone.
pub fn bucket_partition(row_key: &str, buckets: u32) -> String {
    let bucket = crc32fast::hash(row_key.as_bytes()) % buckets.max(1);
    format!("{bucket:04}")
}

/// Keys for a row whose partition is bucketed from its row key
pub fn bucketed_keys(row_key: impl Into<String>, buckets: u32) -> EntityKeys {
    let row_key = row_key.into();
    EntityKeys::new(bucket_partition(&row_key, buckets), row_key)
}

/// Check a single key against the store's character and length rules
pub fn validate_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(KeyError::TooLong(key.len()));
    }
    if let Some(c) = key
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(KeyError::ForbiddenChar(c));
    }
    Ok(())
}

pub fn validate_keys(keys: &EntityKeys) -> Result<(), KeyError> {
    validate_key(&keys.partition_key)?;
    validate_key(&keys.row_key)
}
