// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paginated scans return every row of a partition exactly once, in order.

use crate::prelude::*;
use futures::TryStreamExt;
use similar_asserts::assert_eq;
use tabletx_engine::Stored;

#[tokio::test]
async fn batch_written_partition_scans_back_in_order() {
    let fake = fake_with(&[Reading::TABLE]);
    let mut config = fast_config();
    config.scan.page_size = 64;
    let engine = engine_with(&fake, config);

    let mut input: Vec<Reading> = (0..300).rev().map(|seq| Reading::new("s1", seq)).collect();
    input.extend((0..40).map(|seq| Reading::new("s2", seq)));
    engine.batch_writer().write_batch(input).await.unwrap();

    let rows: Vec<Stored<Reading>> = engine
        .scanner()
        .scan_partition::<Reading>("s1")
        .try_collect()
        .await
        .unwrap();

    let seqs: Vec<u32> = rows.iter().map(|r| r.entity.seq).collect();
    assert_eq!(seqs, (0..300).collect::<Vec<u32>>());
    // 300 rows at 64 per page
    assert_eq!(fake.calls_of(OpKind::Scan).len(), 5);
}

#[tokio::test]
async fn table_scan_sees_every_partition() {
    let fake = fake_with(&[Reading::TABLE]);
    let mut config = fast_config();
    config.scan.page_size = 7;
    let engine = engine_with(&fake, config);

    let input: Vec<Reading> = ["a", "b", "c"]
        .iter()
        .flat_map(|sensor| (0..10).map(move |seq| Reading::new(sensor, seq)))
        .collect();
    engine.batch_writer().write_batch(input).await.unwrap();

    let rows: Vec<Stored<Reading>> = engine
        .scanner()
        .scan_table::<Reading>()
        .try_collect()
        .await
        .unwrap();

    let mut sensors: Vec<String> = rows.iter().map(|r| r.entity.sensor.clone()).collect();
    sensors.dedup();
    assert_eq!(rows.len(), 30);
    assert_eq!(sensors, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn scanning_a_table_that_was_never_written_is_empty() {
    let fake = FakeTransport::new();
    let rows: Vec<Stored<Reading>> = engine(&fake)
        .scanner()
        .scan_partition::<Reading>("s1")
        .try_collect()
        .await
        .unwrap();

    assert!(rows.is_empty());
    assert!(fake.store().rows(Reading::TABLE).is_empty());
}
