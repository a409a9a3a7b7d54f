// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pessimistic locks serialise critical sections and always come off.

use crate::prelude::*;
use similar_asserts::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabletx_engine::{AbandonAfter, BoxError, LockError, LockOptions};

async fn seeded_account(fake: &FakeTransport, owner: &str, balance: i64) {
    engine(fake)
        .store()
        .create(&Account::new(owner, balance))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_holder_at_a_time() {
    let fake = fake_with(&[Account::TABLE]);
    seeded_account(&fake, "vault", 0).await;
    let engine = engine(&fake);
    let holders = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let locks = engine.locks();
        let holders = Arc::clone(&holders);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            locks
                .locked_update_by_id(
                    &"vault".to_string(),
                    LockOptions::<Account>::new(),
                    |current, handle| async move {
                        let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(3)).await;
                        holders.fetch_sub(1, Ordering::SeqCst);

                        let mut account = current.entity;
                        account.balance += 10;
                        let released = handle.commit(account).await?;
                        Ok::<_, BoxError>(((), released))
                    },
                )
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    let vault = engine
        .store()
        .find::<Account>(&"vault".to_string())
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(vault.entity.balance, 50);
    assert!(!vault.is_locked());
}

#[tokio::test]
async fn failing_critical_section_still_releases() {
    let fake = fake_with(&[Account::TABLE]);
    seeded_account(&fake, "vault", 5).await;
    let locks = engine(&fake).locks();

    let err = locks
        .locked_update_by_id(
            &"vault".to_string(),
            LockOptions::<Account>::new(),
            |_current, _handle| async move {
                Err::<((), _), BoxError>("ledger unavailable".into())
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::CriticalSection(_)));

    // A second caller gets straight in
    let balance = locks
        .locked_update_by_id(
            &"vault".to_string(),
            LockOptions::<Account>::new().policy(AbandonAfter(0)),
            |current, handle| async move {
                let balance = current.entity.balance;
                let released = handle.unlock().await?;
                Ok::<_, BoxError>((balance, released))
            },
        )
        .await
        .unwrap();
    assert_eq!(balance, 5);
}

#[tokio::test]
async fn writes_around_the_handle_leave_the_lock_held() {
    let fake = fake_with(&[Account::TABLE]);
    seeded_account(&fake, "vault", 1).await;
    let engine = engine(&fake);
    let store = engine.store();

    engine
        .locks()
        .locked_update_by_id(
            &"vault".to_string(),
            LockOptions::<Account>::new(),
            |_current, handle| async move {
                // A read-modify-write under the lock keeps the lock field
                store
                    .create_or_update::<Account, _>(&"vault".to_string(), |a| a.balance += 1)
                    .await?;
                let row = store
                    .find::<Account>(&"vault".to_string())
                    .await?
                    .found()
                    .map(|stored| stored.is_locked());
                assert_eq!(row, Some(true));
                let released = handle.unlock().await;
                // Our view of the row is stale now, so the release loses
                assert!(released.is_err());
                Err::<((), _), BoxError>("stale handle".into())
            },
        )
        .await
        .unwrap_err();

    let vault = engine
        .store()
        .find::<Account>(&"vault".to_string())
        .await
        .unwrap()
        .found()
        .unwrap();
    // Cleanup only clears the row it locked; this one was rewritten since
    assert_eq!(vault.entity.balance, 2);
    assert!(vault.is_locked());
}
