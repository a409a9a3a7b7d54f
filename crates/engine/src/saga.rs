// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-step writes with compensation
//!
//! Steps run in order. When one fails, the compensations of the steps
//! that already succeeded run in reverse order and the failure is
//! returned. A failing compensation does not stop the unwind; it is
//! logged and recorded in the [`SagaReport`].

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;

type Action<'a, Er> = Box<dyn FnOnce() -> BoxFuture<'a, Result<(), Er>> + Send + 'a>;

struct Step<'a, Er> {
    name: String,
    forward: Action<'a, Er>,
    compensate: Action<'a, Er>,
}

/// How a saga ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SagaState {
    Committed,
    RolledBack { failed_step: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompensationFailure {
    pub step: String,
    pub error: String,
}

#[derive(Debug)]
pub struct SagaReport<R, Er> {
    pub result: Result<R, Er>,
    pub state: SagaState,
    /// Steps whose compensation succeeded, in the order they ran
    pub compensated: Vec<String>,
    pub compensation_failures: Vec<CompensationFailure>,
}

/// An ordered list of forward actions, each paired with its undo
pub struct Saga<'a, Er> {
    name: String,
    steps: Vec<Step<'a, Er>>,
}

impl<'a, Er: std::fmt::Display + Send + 'a> Saga<'a, Er> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step<F, FFut, G, GFut>(
        mut self,
        name: impl Into<String>,
        forward: F,
        compensate: G,
    ) -> Self
    where
        F: FnOnce() -> FFut + Send + 'a,
        FFut: Future<Output = Result<(), Er>> + Send + 'a,
        G: FnOnce() -> GFut + Send + 'a,
        GFut: Future<Output = Result<(), Er>> + Send + 'a,
    {
        self.steps.push(Step {
            name: name.into(),
            forward: Box::new(move || forward().boxed()),
            compensate: Box::new(move || compensate().boxed()),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step, then `on_all_succeeded`, returning its value or the
    /// first step failure
    pub async fn execute<R, S, SFut>(self, on_all_succeeded: S) -> Result<R, Er>
    where
        S: FnOnce() -> SFut,
        SFut: Future<Output = R>,
    {
        self.execute_with_report(on_all_succeeded).await.result
    }

    /// Like [`execute`](Self::execute), also reporting what was unwound
    pub async fn execute_with_report<R, S, SFut>(self, on_all_succeeded: S) -> SagaReport<R, Er>
    where
        S: FnOnce() -> SFut,
        SFut: Future<Output = R>,
    {
        let saga = self.name;
        let total = self.steps.len();
        let mut done: Vec<(String, Action<'a, Er>)> = Vec::with_capacity(total);

        for (index, step) in self.steps.into_iter().enumerate() {
            tracing::debug!(saga = %saga, step = %step.name, index, total, "running step");
            match (step.forward)().await {
                Ok(()) => done.push((step.name, step.compensate)),
                Err(error) => {
                    tracing::warn!(
                        saga = %saga,
                        step = %step.name,
                        %error,
                        to_compensate = done.len(),
                        "step failed, compensating"
                    );
                    let (compensated, compensation_failures) = unwind(&saga, done).await;
                    return SagaReport {
                        result: Err(error),
                        state: SagaState::RolledBack {
                            failed_step: step.name,
                        },
                        compensated,
                        compensation_failures,
                    };
                }
            }
        }

        tracing::debug!(saga = %saga, total, "all steps succeeded");
        SagaReport {
            result: Ok(on_all_succeeded().await),
            state: SagaState::Committed,
            compensated: Vec::new(),
            compensation_failures: Vec::new(),
        }
    }
}

async fn unwind<'a, Er: std::fmt::Display>(
    saga: &str,
    done: Vec<(String, Action<'a, Er>)>,
) -> (Vec<String>, Vec<CompensationFailure>) {
    let mut compensated = Vec::new();
    let mut failures = Vec::new();
    for (name, compensate) in done.into_iter().rev() {
        match compensate().await {
            Ok(()) => {
                tracing::debug!(saga, step = %name, "compensated");
                compensated.push(name);
            }
            Err(error) => {
                tracing::error!(saga, step = %name, %error, "compensation failed");
                failures.push(CompensationFailure {
                    step: name,
                    error: error.to_string(),
                });
            }
        }
    }
    (compensated, failures)
}

#[cfg(test)]
#[path = "saga_tests.rs"]
mod tests;
