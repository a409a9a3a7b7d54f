// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch writes are split per partition and at the store's size limit.

use crate::prelude::*;
use similar_asserts::assert_eq;
use tabletx_engine::BatchOutcome;

fn submitted(fake: &FakeTransport) -> Vec<(String, usize)> {
    fake.calls_of(OpKind::ExecuteBatch)
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::ExecuteBatch {
                partition_key,
                size,
                ..
            } => Some((partition_key, size)),
            _ => None,
        })
        .collect()
}

fn readings(sensor: &str, range: std::ops::Range<u32>) -> Vec<Reading> {
    range.map(|seq| Reading::new(sensor, seq)).collect()
}

#[tokio::test]
async fn two_hundred_fifty_rows_go_out_as_three_transactions() {
    let fake = fake_with(&[Reading::TABLE]);
    let writer = engine(&fake).batch_writer();

    let results = writer.write_batch(readings("s1", 0..250)).await.unwrap();

    assert_eq!(
        submitted(&fake),
        vec![
            ("s1".to_string(), 100),
            ("s1".to_string(), 100),
            ("s1".to_string(), 50),
        ]
    );
    assert_eq!(results.len(), 250);
    assert_eq!(fake.store().row_count(Reading::TABLE), 250);
}

#[tokio::test]
async fn interleaved_partitions_never_share_a_transaction() {
    let fake = fake_with(&[Reading::TABLE]);
    let writer = engine(&fake).batch_writer();

    let mut input = Vec::new();
    for seq in 0..120 {
        input.push(Reading::new("north", seq));
        input.push(Reading::new("south", seq));
    }
    let results = writer.write_batch(input.clone()).await.unwrap();

    assert_eq!(
        submitted(&fake),
        vec![
            ("north".to_string(), 100),
            ("north".to_string(), 20),
            ("south".to_string(), 100),
            ("south".to_string(), 20),
        ]
    );
    let returned: Vec<Reading> = results.into_iter().map(|r| r.entity).collect();
    assert_eq!(returned, input);
}

#[tokio::test]
async fn repeated_keys_are_written_once() {
    let fake = fake_with(&[Reading::TABLE]);
    let writer = engine(&fake).batch_writer();

    let mut input = readings("s1", 0..5);
    input.push(Reading::new("s1", 2));
    let results = writer.write_batch(input).await.unwrap();

    let dropped: Vec<u32> = results
        .iter()
        .filter(|r| r.outcome == BatchOutcome::DuplicateDropped)
        .map(|r| r.entity.seq)
        .collect();
    assert_eq!(dropped, vec![2]);
    assert_eq!(submitted(&fake), vec![("s1".to_string(), 5)]);
}

#[tokio::test]
async fn rejected_first_chunk_commits_nothing() {
    let fake = fake_with(&[Reading::TABLE]);
    let writer = engine(&fake).batch_writer();
    fake.fail_next(
        OpKind::ExecuteBatch,
        TransportError::Fatal("partition offline".into()),
    );

    let results = writer.write_batch(readings("s1", 0..250)).await.unwrap();

    assert!(results[..100].iter().all(|r| matches!(
        r.outcome,
        BatchOutcome::Rejected { ref reason } if reason.contains("partition offline")
    )));
    assert!(results[100..]
        .iter()
        .all(|r| r.outcome == BatchOutcome::NotAttempted));
    assert_eq!(submitted(&fake), vec![("s1".to_string(), 100)]);
    assert_eq!(fake.store().row_count(Reading::TABLE), 0);
}
