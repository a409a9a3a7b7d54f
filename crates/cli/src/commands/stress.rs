// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stress commands
//!
//! Each scenario runs concurrent workers against a fresh in-memory store and
//! fails when the stored result disagrees with the work performed.

use crate::counter::Counter;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabletx_adapters::{MemoryTransport, TracedTransport};
use tabletx_core::EngineConfig;
use tabletx_engine::{BoxError, LockOptions, TableEngine};

type StressEngine = TableEngine<TracedTransport<MemoryTransport>>;

#[derive(Args)]
pub struct StressArgs {
    #[command(subcommand)]
    pub command: StressCommand,
}

#[derive(Subcommand)]
pub enum StressCommand {
    /// Concurrent read-modify-write increments of one counter
    Counter {
        /// Concurrent workers
        #[arg(long, default_value = "8")]
        workers: usize,
        /// Increments per worker
        #[arg(long, default_value = "25")]
        increments: usize,
        /// Counter name
        #[arg(long, default_value = "hits")]
        name: String,
    },
    /// Concurrent locked updates of one counter
    Lock {
        /// Concurrent workers
        #[arg(long, default_value = "4")]
        workers: usize,
        /// Locked updates per worker
        #[arg(long, default_value = "5")]
        rounds: usize,
        /// Time spent inside each critical section, in milliseconds
        #[arg(long, default_value = "2")]
        hold_ms: u64,
        /// Counter name
        #[arg(long, default_value = "guarded")]
        name: String,
    },
}

pub async fn handle(
    command: StressCommand,
    config: EngineConfig,
    format: OutputFormat,
) -> Result<()> {
    let engine = TableEngine::builder(TracedTransport::new(MemoryTransport::new()))
        .config(config)
        .build()?;

    let summary = match command {
        StressCommand::Counter {
            workers,
            increments,
            name,
        } => counter(&engine, workers, increments, name).await?,
        StressCommand::Lock {
            workers,
            rounds,
            hold_ms,
            name,
        } => lock(&engine, workers, rounds, Duration::from_millis(hold_ms), name).await?,
    };

    output::print(&summary, format);
    if !summary.passed {
        bail!(
            "{}: expected {} but stored {}",
            summary.scenario,
            summary.expected,
            summary.stored
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct StressSummary {
    scenario: &'static str,
    workers: usize,
    operations: usize,
    expected: i64,
    stored: i64,
    /// Mutations re-applied after losing a race
    conflicts: u64,
    /// Most critical sections observed running at once
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_holders: Option<usize>,
    elapsed_ms: u64,
    passed: bool,
}

impl fmt::Display for StressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        write!(
            f,
            "{} {}: {} workers, {} operations, stored {} (expected {}), {} conflicts",
            verdict,
            self.scenario,
            self.workers,
            self.operations,
            self.stored,
            self.expected,
            self.conflicts
        )?;
        if let Some(peak) = self.peak_holders {
            write!(f, ", peak holders {}", peak)?;
        }
        write!(f, " in {}ms", self.elapsed_ms)
    }
}

async fn counter(
    engine: &StressEngine,
    workers: usize,
    increments: usize,
    name: String,
) -> Result<StressSummary> {
    let started = Instant::now();
    let mutations = Arc::new(AtomicU64::new(0));

    let mut tasks = Vec::with_capacity(workers);
    for worker in 0..workers {
        let store = engine.store();
        let name = name.clone();
        let mutations = Arc::clone(&mutations);
        tasks.push(tokio::spawn(async move {
            let writer = format!("worker-{worker}");
            for _ in 0..increments {
                store
                    .create_or_update::<Counter, _>(&name, |counter| {
                        mutations.fetch_add(1, Ordering::Relaxed);
                        counter.count += 1;
                        counter.last_writer = Some(writer.clone());
                    })
                    .await?;
            }
            Ok::<_, tabletx_engine::StoreError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let operations = workers * increments;
    let stored = stored_count(engine, &name).await?;
    let expected = operations as i64;
    tracing::info!(stored, expected, "counter stress finished");

    Ok(StressSummary {
        scenario: "counter",
        workers,
        operations,
        expected,
        stored,
        conflicts: mutations.load(Ordering::Relaxed).saturating_sub(operations as u64),
        peak_holders: None,
        elapsed_ms: started.elapsed().as_millis() as u64,
        passed: stored == expected,
    })
}

async fn lock(
    engine: &StressEngine,
    workers: usize,
    rounds: usize,
    hold: Duration,
    name: String,
) -> Result<StressSummary> {
    let started = Instant::now();
    engine
        .store()
        .insert_or_replace(&Counter {
            name: name.clone(),
            count: 0,
            last_writer: None,
        })
        .await?;

    let holders = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::with_capacity(workers);
    for worker in 0..workers {
        let locks = engine.locks();
        let name = name.clone();
        let holders = Arc::clone(&holders);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            for _ in 0..rounds {
                let holders = Arc::clone(&holders);
                let peak = Arc::clone(&peak);
                locks
                    .locked_update_by_id::<Counter, _, _, _>(
                        &name,
                        LockOptions::new(),
                        move |current, handle| async move {
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(hold).await;
                            holders.fetch_sub(1, Ordering::SeqCst);

                            let mut counter = current.entity;
                            counter.count += 1;
                            counter.last_writer = Some(format!("worker-{worker}"));
                            let released = handle.commit(counter).await?;
                            Ok::<_, BoxError>(((), released))
                        },
                    )
                    .await?;
            }
            Ok::<_, tabletx_engine::LockError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let operations = workers * rounds;
    let stored = stored_count(engine, &name).await?;
    let expected = operations as i64;
    let peak = peak.load(Ordering::SeqCst);
    tracing::info!(stored, expected, peak, "lock stress finished");

    Ok(StressSummary {
        scenario: "lock",
        workers,
        operations,
        expected,
        stored,
        conflicts: 0,
        peak_holders: Some(peak),
        elapsed_ms: started.elapsed().as_millis() as u64,
        passed: stored == expected && peak <= 1,
    })
}

async fn stored_count(engine: &StressEngine, name: &str) -> Result<i64> {
    let stored = engine
        .store()
        .find::<Counter>(&name.to_string())
        .await?
        .found()
        .map(|stored| stored.entity.count)
        .unwrap_or(0);
    Ok(stored)
}
