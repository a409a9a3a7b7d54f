// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state and the retrying call runner used by every component

use crate::error::{CallError, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabletx_adapters::{Transport, TransportError};
use tabletx_core::{
    validate_keys, Clock, ContentionBackoff, ContentionRetry, EngineConfig, EntityKeys, Row,
    TransientBackoff,
};

/// Server-side style check on rows about to be written
///
/// A rejection surfaces as [`StoreError::ModificationRejected`] and is
/// never retried.
pub trait WriteValidator: Send + Sync {
    fn validate(&self, table: &str, row: &Row) -> Result<(), String>;
}

impl<F> WriteValidator for F
where
    F: Fn(&str, &Row) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, table: &str, row: &Row) -> Result<(), String> {
        self(table, row)
    }
}

pub(crate) struct StoreContext<T, C> {
    pub(crate) transport: T,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
    validators: Vec<Arc<dyn WriteValidator>>,
}

impl<T: Transport, C: Clock> StoreContext<T, C> {
    pub(crate) fn new(
        transport: T,
        clock: C,
        config: EngineConfig,
        validators: Vec<Arc<dyn WriteValidator>>,
    ) -> Self {
        Self {
            transport,
            clock,
            config,
            validators,
        }
    }

    /// Checks applied to every application write before it is sent
    pub(crate) fn validate_write(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        validate_keys(&row.keys)?;
        for validator in &self.validators {
            if let Err(reason) = validator.validate(table, row) {
                tracing::warn!(table, keys = %row.keys, %reason, "write rejected");
                return Err(StoreError::ModificationRejected(reason));
            }
        }
        Ok(())
    }

    /// Run a write, creating the table once if it is missing
    pub(crate) async fn call_write<R, F, Fut>(
        &self,
        table: &str,
        op: &'static str,
        f: F,
    ) -> Result<R, CallError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R, TransportError>> + Send,
        R: Send,
    {
        self.run(table, op, self.config.auto_create_tables, f).await
    }

    /// Run a read or a conditional write; a missing table is reported as-is
    pub(crate) async fn call_read<R, F, Fut>(
        &self,
        table: &str,
        op: &'static str,
        f: F,
    ) -> Result<R, CallError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R, TransportError>> + Send,
        R: Send,
    {
        self.run(table, op, false, f).await
    }

    async fn run<R, F, Fut>(
        &self,
        table: &str,
        op: &'static str,
        create_missing: bool,
        mut f: F,
    ) -> Result<R, CallError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R, TransportError>> + Send,
        R: Send,
    {
        let started = self.clock.now();
        let mut backoff = TransientBackoff::new(&self.config.retry.transient);
        let mut created = false;

        loop {
            let fault = match f().await {
                Ok(value) => return Ok(value),
                Err(fault) => fault,
            };

            let message = match fault {
                TransportError::Timeout(message) => message,
                TransportError::TableMissing(_) if create_missing && !created => {
                    tracing::info!(table, op, "table missing, creating it");
                    match self.transport.create_table(table).await {
                        Ok(()) => {
                            created = true;
                            continue;
                        }
                        Err(TransportError::Timeout(message)) => message,
                        Err(other) => return Err(CallError::Fault(other)),
                    }
                }
                other => return Err(CallError::Fault(other)),
            };

            let Some(delay) = backoff.next_delay() else {
                tracing::error!(
                    table,
                    op,
                    attempts = backoff.attempts(),
                    error = %message,
                    "transient retries exhausted"
                );
                return Err(StoreError::RetriesExhausted {
                    attempts: backoff.attempts(),
                    last: message,
                }
                .into());
            };
            self.check_deadline(started, self.config.operation_deadline, backoff.attempts())?;
            tracing::warn!(
                table,
                op,
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "transient fault, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn check_deadline(
        &self,
        started: Instant,
        deadline: Option<Duration>,
        attempts: u32,
    ) -> Result<(), StoreError> {
        match deadline {
            Some(limit) if self.clock.now().saturating_duration_since(started) >= limit => {
                Err(StoreError::DeadlineExceeded {
                    deadline: limit,
                    attempts,
                })
            }
            _ => Ok(()),
        }
    }

    /// Contention waiter using the configured conflict policy
    pub(crate) fn conflicts(&self) -> ConflictRetry<'_, T, C> {
        self.conflicts_with(
            &self.config.retry.contention,
            self.config.operation_deadline,
        )
    }

    pub(crate) fn conflicts_with(
        &self,
        policy: &ContentionRetry,
        deadline: Option<Duration>,
    ) -> ConflictRetry<'_, T, C> {
        ConflictRetry {
            ctx: self,
            backoff: ContentionBackoff::new(policy),
            started: self.clock.now(),
            deadline,
        }
    }
}

/// Backs off between attempts of a read-modify-write loop that lost a race
pub(crate) struct ConflictRetry<'a, T, C> {
    ctx: &'a StoreContext<T, C>,
    backoff: ContentionBackoff,
    started: Instant,
    deadline: Option<Duration>,
}

impl<T: Transport, C: Clock> ConflictRetry<'_, T, C> {
    /// Record a lost race on `keys` and sleep before the next attempt
    pub(crate) async fn wait(&mut self, keys: &EntityKeys) -> Result<(), StoreError> {
        let Some(delay) = self.backoff.next_delay(self.ctx.clock.now()) else {
            tracing::warn!(keys = %keys, retries = self.backoff.retries(), "contention retries exhausted");
            return Err(StoreError::RetriesExhausted {
                attempts: self.backoff.retries(),
                last: format!("version conflict on {keys}"),
            });
        };
        self.ctx
            .check_deadline(self.started, self.deadline, self.backoff.retries())?;
        tracing::debug!(
            keys = %keys,
            retry = self.backoff.retries(),
            delay_ms = delay.as_millis() as u64,
            "lost race, retrying"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Lost races so far
    pub(crate) fn retries(&self) -> u32 {
        self.backoff.retries()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.ctx.clock.now().saturating_duration_since(self.started)
    }
}
