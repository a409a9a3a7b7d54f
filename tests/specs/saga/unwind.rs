// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sagas over the store: committed steps are undone when a later step fails.

use crate::prelude::*;
use similar_asserts::assert_eq;
use tabletx_core::FakeClock;
use tabletx_engine::{EntityStore, Saga, SagaState, StoreError};

async fn balance(store: &EntityStore<FakeTransport, FakeClock>, owner: &str) -> i64 {
    store
        .find::<Account>(&owner.to_string())
        .await
        .unwrap()
        .found()
        .map_or(0, |stored| stored.entity.balance)
}

async fn adjust(
    store: &EntityStore<FakeTransport, FakeClock>,
    owner: &str,
    delta: i64,
) -> Result<(), StoreError> {
    store
        .create_or_update::<Account, _>(&owner.to_string(), |a| a.balance += delta)
        .await
        .map(drop)
}

#[tokio::test]
async fn failed_transfer_restores_both_accounts() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    store.create(&Account::new("alice", 100)).await.unwrap();
    store.create(&Account::new("bob", 0)).await.unwrap();
    let s = &store;

    let report = Saga::<StoreError>::new("transfer")
        .step(
            "debit alice",
            move || adjust(s, "alice", -30),
            move || adjust(s, "alice", 30),
        )
        .step(
            "credit bob",
            move || adjust(s, "bob", 30),
            move || adjust(s, "bob", -30),
        )
        .step(
            "record audit",
            || async { Err(StoreError::ModificationRejected("audit log full".into())) },
            || async { Ok(()) },
        )
        .execute_with_report(|| async {})
        .await;

    assert!(report.result.is_err());
    assert_eq!(
        report.state,
        SagaState::RolledBack {
            failed_step: "record audit".to_string()
        }
    );
    assert_eq!(report.compensated, vec!["credit bob", "debit alice"]);
    assert_eq!(balance(&store, "alice").await, 100);
    assert_eq!(balance(&store, "bob").await, 0);
}

#[tokio::test]
async fn successful_transfer_commits_every_step() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    store.create(&Account::new("alice", 100)).await.unwrap();
    let s = &store;

    let moved = Saga::<StoreError>::new("transfer")
        .step(
            "debit alice",
            move || adjust(s, "alice", -30),
            move || adjust(s, "alice", 30),
        )
        .step(
            "credit bob",
            move || adjust(s, "bob", 30),
            move || adjust(s, "bob", -30),
        )
        .execute(|| async { 30 })
        .await
        .unwrap();

    assert_eq!(moved, 30);
    assert_eq!(balance(&store, "alice").await, 70);
    assert_eq!(balance(&store, "bob").await, 30);
}

#[tokio::test]
async fn failed_compensation_is_reported_and_the_rest_still_run() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    store.create(&Account::new("alice", 100)).await.unwrap();
    let s = &store;

    let report = Saga::<StoreError>::new("transfer")
        .step(
            "debit alice",
            move || adjust(s, "alice", -30),
            move || adjust(s, "alice", 30),
        )
        .step(
            "reserve",
            || async { Ok(()) },
            || async { Err(StoreError::ModificationRejected("reservation gone".into())) },
        )
        .step(
            "credit bob",
            || async { Err(StoreError::ModificationRejected("bob frozen".into())) },
            || async { Ok(()) },
        )
        .execute_with_report(|| async {})
        .await;

    assert_eq!(report.compensated, vec!["debit alice"]);
    assert_eq!(report.compensation_failures.len(), 1);
    assert_eq!(report.compensation_failures[0].step, "reserve");
    assert_eq!(balance(&store, "alice").await, 100);
}

#[tokio::test]
async fn failure_at_step_two_undoes_only_step_one() {
    let fake = fake_with(&[Account::TABLE]);
    let store = engine(&fake).store();
    store.create(&Account::new("alice", 100)).await.unwrap();
    let s = &store;

    let report = Saga::<StoreError>::new("three steps")
        .step(
            "debit alice",
            move || adjust(s, "alice", -10),
            move || adjust(s, "alice", 10),
        )
        .step(
            "credit bob",
            || async { Err(StoreError::ModificationRejected("bob closed".into())) },
            move || adjust(s, "bob", -10),
        )
        .step(
            "notify",
            move || adjust(s, "carol", 1),
            move || adjust(s, "carol", -1),
        )
        .execute_with_report(|| async {})
        .await;

    assert!(matches!(
        report.result,
        Err(StoreError::ModificationRejected(ref reason)) if reason == "bob closed"
    ));
    assert_eq!(report.compensated, vec!["debit alice"]);
    assert_eq!(balance(&store, "alice").await, 100);
    assert!(!store
        .find::<Account>(&"bob".to_string())
        .await
        .unwrap()
        .is_found());
    assert!(!store
        .find::<Account>(&"carol".to_string())
        .await
        .unwrap()
        .is_found());
}
