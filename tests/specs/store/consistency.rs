// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity store consistency under contention and faults.

use crate::prelude::*;
use similar_asserts::assert_eq;
use tabletx_engine::{CreateOutcome, ReplaceOutcome, StoreError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_never_lost() {
    let fake = fake_with(&[Account::TABLE]);
    let engine = engine(&fake);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = engine.store();
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                store
                    .create_or_update::<Account, _>(&"shared".to_string(), |a| a.balance += 1)
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = engine
        .store()
        .find::<Account>(&"shared".to_string())
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(stored.entity.balance, 160);
}

#[tokio::test]
async fn written_entity_reads_back_unchanged() {
    let fake = fake_with(&[Reading::TABLE]);
    let store = engine(&fake).store();
    let reading = Reading::new("boiler-7", 42);

    let created = store.create(&reading).await.unwrap().created().unwrap();
    let found = store
        .find::<Reading>(&("boiler-7".to_string(), 42))
        .await
        .unwrap()
        .found()
        .unwrap();

    assert_eq!(found.entity, reading);
    assert_eq!(found.version, created.version);
    assert_eq!(found.keys.row_key, "00000042");
}

#[tokio::test]
async fn stale_writer_loses_and_leaves_the_winner_in_place() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    let original = store
        .create(&Account::new("ada", 10))
        .await
        .unwrap()
        .created()
        .unwrap();

    let first = store
        .replace(&Account::new("ada", 20), &original.version)
        .await
        .unwrap();
    let second = store
        .replace(&Account::new("ada", 30), &original.version)
        .await
        .unwrap();

    assert!(matches!(first, ReplaceOutcome::Replaced(_)));
    assert_eq!(second, ReplaceOutcome::VersionConflict);
    let current = store
        .find::<Account>(&"ada".to_string())
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(current.entity.balance, 20);
}

#[tokio::test]
async fn second_create_reports_existing_row() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();

    store.create(&Account::new("ada", 1)).await.unwrap();
    let again = store.create(&Account::new("ada", 2)).await.unwrap();

    assert_eq!(again, CreateOutcome::AlreadyExists);
}

#[tokio::test]
async fn first_write_creates_the_missing_table_once() {
    let fake = FakeTransport::new();
    let store = engine(&fake).store();

    store.create(&Account::new("ada", 1)).await.unwrap();
    store.create(&Account::new("bob", 2)).await.unwrap();

    assert_eq!(fake.calls_of(OpKind::CreateTable).len(), 1);
    assert_eq!(fake.store().row_count(Account::TABLE), 2);
}

#[tokio::test]
async fn persistent_timeouts_exhaust_the_retry_budget() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    fake.fail_times(OpKind::Insert, TransportError::Timeout("throttled".into()), 10);

    let err = store.create(&Account::new("ada", 1)).await.unwrap_err();

    assert!(matches!(err, StoreError::RetriesExhausted { attempts: 4, .. }));
    assert_eq!(fake.calls_of(OpKind::Insert).len(), 4);
    assert_eq!(fake.store().row_count(Account::TABLE), 0);
}

#[tokio::test]
async fn brief_timeouts_are_absorbed() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    fake.fail_times(OpKind::Insert, TransportError::Timeout("throttled".into()), 2);

    let outcome = store.create(&Account::new("ada", 1)).await.unwrap();

    assert!(outcome.created().is_some());
    assert_eq!(fake.calls_of(OpKind::Insert).len(), 3);
}
