// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative row locks
//!
//! A lock is the reserved `_locked_at` field on the row itself, set and
//! cleared with conditional replaces, so it is visible to every process
//! sharing the table. Acquisition reads the row, and if it is unlocked
//! writes it back with the field set at the read version. Losing that race
//! backs off like any other contention.
//!
//! The critical section receives a [`LockHandle`] and must give back the
//! [`Released`] proof that only [`LockHandle::commit`] or
//! [`LockHandle::unlock`] can produce. If the critical section fails
//! without releasing, the coordinator clears the lock on a best-effort
//! basis, and only if the lock is still ours.

use crate::error::StoreError;
use crate::outcome::Stored;
use crate::store::EntityStore;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabletx_adapters::Transport;
use tabletx_core::{to_row, Clock, ContentionRetry, Entity, EntityKeys, MappingError, Row};
use thiserror::Error;

/// Error type critical sections report failures with
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("row not found: {0}")]
    NotFound(EntityKeys),
    #[error("lock on {0} refused by predicate")]
    Rejected(EntityKeys),
    #[error("lock on {keys} abandoned after {retries} retries ({elapsed:?})")]
    Abandoned {
        keys: EntityKeys,
        retries: u32,
        elapsed: Duration,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("critical section failed: {0}")]
    CriticalSection(#[source] BoxError),
}

/// Observed state of a lock held by someone else
#[derive(Clone, Debug)]
pub struct LockContention {
    pub keys: EntityKeys,
    pub locked_at: DateTime<Utc>,
    /// How long ago the holder took the lock
    pub lock_age: Duration,
    /// Our lost races so far
    pub retries: u32,
    /// How long we have been trying
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockDecision {
    Retry,
    /// Clear the other holder's lock, then try again
    ForceUnlock,
    Abandon,
}

/// What to do when the row is already locked
pub trait AlreadyLockedPolicy: Send + Sync {
    fn decide(&self, contention: &LockContention) -> LockDecision;
}

/// Wait for the holder, however long it takes
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepRetrying;

impl AlreadyLockedPolicy for KeepRetrying {
    fn decide(&self, _contention: &LockContention) -> LockDecision {
        LockDecision::Retry
    }
}

/// Treat a lock older than the threshold as abandoned by a crashed holder
#[derive(Clone, Copy, Debug)]
pub struct ForceUnlockAfter(pub Duration);

impl AlreadyLockedPolicy for ForceUnlockAfter {
    fn decide(&self, contention: &LockContention) -> LockDecision {
        if contention.lock_age >= self.0 {
            LockDecision::ForceUnlock
        } else {
            LockDecision::Retry
        }
    }
}

/// Give up once the row has been found locked this many times
#[derive(Clone, Copy, Debug)]
pub struct AbandonAfter(pub u32);

impl AlreadyLockedPolicy for AbandonAfter {
    fn decide(&self, contention: &LockContention) -> LockDecision {
        if contention.retries >= self.0 {
            LockDecision::Abandon
        } else {
            LockDecision::Retry
        }
    }
}

type LockPredicate<E> = Box<dyn Fn(&Stored<E>) -> bool + Send + Sync>;

/// Per-call knobs for [`LockCoordinator::locked_update`]
pub struct LockOptions<E> {
    should_lock: Option<LockPredicate<E>>,
    policy: Option<Arc<dyn AlreadyLockedPolicy>>,
    deadline: Option<Duration>,
    max_attempts: Option<u32>,
}

impl<E> Default for LockOptions<E> {
    fn default() -> Self {
        Self {
            should_lock: None,
            policy: None,
            deadline: None,
            max_attempts: None,
        }
    }
}

impl<E> LockOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only lock rows the predicate accepts; others fail with
    /// [`LockError::Rejected`]
    pub fn should_lock(
        mut self,
        predicate: impl Fn(&Stored<E>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_lock = Some(Box::new(predicate));
        self
    }

    pub fn policy(mut self, policy: impl AlreadyLockedPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Give up acquiring after this long
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Give up acquiring after this many attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Proof that a critical section released its lock
#[derive(Debug)]
pub struct Released<E> {
    stored: Stored<E>,
}

impl<E> Released<E> {
    /// The row as left by the release
    pub fn stored(&self) -> &Stored<E> {
        &self.stored
    }

    pub fn into_stored(self) -> Stored<E> {
        self.stored
    }
}

/// Held lock on one row, consumed by the write that releases it
pub struct LockHandle<T, C, E> {
    store: EntityStore<T, C>,
    /// The row as written by acquisition, lock field included
    row: Row,
    released: Arc<AtomicBool>,
    _entity: PhantomData<fn() -> E>,
}

impl<T: Transport, C: Clock, E: Entity> LockHandle<T, C, E> {
    pub fn keys(&self) -> &EntityKeys {
        &self.row.keys
    }

    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.row.locked_at()
    }

    /// Write `entity` and clear the lock in one conditional replace
    pub async fn commit(self, entity: E) -> Result<Released<E>, StoreError> {
        let row = to_row(&entity)?;
        if row.keys != self.row.keys {
            return Err(MappingError::Invalid {
                field: "keys".to_string(),
                message: format!("locked {} but committed {}", self.row.keys, row.keys),
            }
            .into());
        }
        self.store.ctx.validate_write(E::TABLE, &row)?;
        self.release(row.with_lock(None), entity).await
    }

    /// Clear the lock, leaving the row's fields as they were
    pub async fn unlock(self) -> Result<Released<E>, StoreError> {
        let row = self.row.clone().with_lock(None);
        let entity = tabletx_core::from_row::<E>(&row)?;
        self.release(row, entity).await
    }

    async fn release(self, row: Row, entity: E) -> Result<Released<E>, StoreError> {
        let expected = self
            .row
            .version
            .clone()
            .ok_or_else(|| StoreError::unversioned(&self.row.keys))?;
        match self.store.replace_row(E::TABLE, row, &expected).await? {
            Some(written) => {
                self.released.store(true, Ordering::SeqCst);
                tracing::debug!(keys = %self.row.keys, "lock released");
                Ok(Released {
                    stored: Stored::written(entity, written)?,
                })
            }
            None => {
                tracing::warn!(keys = %self.row.keys, "lock lost before release");
                Err(StoreError::LockLost(self.row.keys.to_string()))
            }
        }
    }
}

/// Runs critical sections under a row lock
pub struct LockCoordinator<T, C> {
    store: EntityStore<T, C>,
}

impl<T, C> Clone for LockCoordinator<T, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Transport, C: Clock> LockCoordinator<T, C> {
    pub(crate) fn new(store: EntityStore<T, C>) -> Self {
        Self { store }
    }

    /// Lock the row at `keys`, run `critical` with the locked entity, and
    /// return its value.
    ///
    /// The critical section must release the lock through its handle. An
    /// error from it is returned as [`LockError::CriticalSection`] after
    /// the lock is cleared.
    pub async fn locked_update<E, R, F, Fut>(
        &self,
        keys: &EntityKeys,
        options: LockOptions<E>,
        critical: F,
    ) -> Result<R, LockError>
    where
        E: Entity,
        F: FnOnce(Stored<E>, LockHandle<T, C, E>) -> Fut + Send,
        Fut: Future<Output = Result<(R, Released<E>), BoxError>> + Send,
        R: Send,
    {
        let (current, row) = self.acquire::<E>(keys, &options).await?;
        let acquired = row.clone();
        tracing::debug!(table = E::TABLE, keys = %keys, "lock acquired");

        let released = Arc::new(AtomicBool::new(false));
        let handle = LockHandle {
            store: self.store.clone(),
            row,
            released: Arc::clone(&released),
            _entity: PhantomData,
        };

        match critical(current, handle).await {
            Ok((value, _released)) => Ok(value),
            Err(error) => {
                tracing::warn!(table = E::TABLE, keys = %keys, %error, "critical section failed");
                if !released.load(Ordering::SeqCst) {
                    self.force_unlock(E::TABLE, acquired).await;
                }
                Err(LockError::CriticalSection(error))
            }
        }
    }

    /// [`locked_update`](Self::locked_update) by entity id
    pub async fn locked_update_by_id<E, R, F, Fut>(
        &self,
        id: &E::Id,
        options: LockOptions<E>,
        critical: F,
    ) -> Result<R, LockError>
    where
        E: Entity,
        F: FnOnce(Stored<E>, LockHandle<T, C, E>) -> Fut + Send,
        Fut: Future<Output = Result<(R, Released<E>), BoxError>> + Send,
        R: Send,
    {
        self.locked_update(&E::encode_keys(id), options, critical)
            .await
    }

    async fn acquire<E: Entity>(
        &self,
        keys: &EntityKeys,
        options: &LockOptions<E>,
    ) -> Result<(Stored<E>, Row), LockError> {
        let ctx = &self.store.ctx;
        let policy: Arc<dyn AlreadyLockedPolicy> =
            match (&options.policy, ctx.config.lock.stale_after) {
                (Some(policy), _) => Arc::clone(policy),
                (None, Some(stale_after)) => Arc::new(ForceUnlockAfter(stale_after)),
                (None, None) => Arc::new(KeepRetrying),
            };
        let contention = ContentionRetry {
            max_attempts: options.max_attempts.or(ctx.config.lock.max_attempts),
            ..ctx.config.retry.contention.clone()
        };
        let deadline = options
            .deadline
            .or(ctx.config.lock.deadline)
            .or(ctx.config.operation_deadline);
        let mut conflicts = ctx.conflicts_with(&contention, deadline);

        loop {
            let Some(row) = self.store.read_row(E::TABLE, keys).await? else {
                return Err(LockError::NotFound(keys.clone()));
            };
            let current = Stored::<E>::from_row(row.clone())?;
            if let Some(predicate) = &options.should_lock {
                if !predicate(&current) {
                    return Err(LockError::Rejected(keys.clone()));
                }
            }

            match current.locked_at {
                Some(locked_at) => {
                    let contention = LockContention {
                        keys: keys.clone(),
                        locked_at,
                        lock_age: (ctx.clock.utc_now() - locked_at)
                            .to_std()
                            .unwrap_or_default(),
                        retries: conflicts.retries(),
                        elapsed: conflicts.elapsed(),
                    };
                    match policy.decide(&contention) {
                        LockDecision::Retry => {
                            tracing::debug!(keys = %keys, %locked_at, "row already locked");
                        }
                        LockDecision::ForceUnlock => {
                            tracing::warn!(
                                keys = %keys,
                                %locked_at,
                                lock_age_ms = contention.lock_age.as_millis() as u64,
                                "forcing unlock of stale lock"
                            );
                            let cleared = row.with_lock(None);
                            if self
                                .store
                                .replace_row(E::TABLE, cleared, &current.version)
                                .await?
                                .is_some()
                            {
                                continue;
                            }
                        }
                        LockDecision::Abandon => {
                            tracing::info!(keys = %keys, retries = contention.retries, "abandoning lock");
                            return Err(LockError::Abandoned {
                                keys: keys.clone(),
                                retries: contention.retries,
                                elapsed: contention.elapsed,
                            });
                        }
                    }
                }
                None => {
                    let now = ctx.clock.utc_now();
                    let locked = row.with_lock(Some(now));
                    if let Some(written) = self
                        .store
                        .replace_row(E::TABLE, locked, &current.version)
                        .await?
                    {
                        let stored = Stored::written(current.entity, written.clone())?;
                        return Ok((stored, written));
                    }
                    tracing::debug!(keys = %keys, "lost lock race");
                }
            }

            conflicts.wait(keys).await?;
        }
    }

    /// Clear the lock written by acquisition, unless the row has been
    /// written since. Failures are logged, not returned.
    async fn force_unlock(&self, table: &str, acquired: Row) {
        let keys = acquired.keys.clone();
        let Some(version) = acquired.version.clone() else {
            return;
        };
        // Conditioned on the acquisition version: any later write, a
        // foreign re-lock at the same timestamp included, wins
        match self
            .store
            .replace_row(table, acquired.with_lock(None), &version)
            .await
        {
            Ok(Some(_)) => {
                tracing::info!(keys = %keys, "lock cleared after failed critical section");
            }
            Ok(None) => {
                tracing::debug!(keys = %keys, "row written since acquisition, leaving lock");
            }
            Err(error) => {
                tracing::error!(keys = %keys, %error, "could not clear lock");
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
