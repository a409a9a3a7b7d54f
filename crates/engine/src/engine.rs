// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine facade: one transport, one configuration, many components

use crate::batch::BatchWriter;
use crate::context::{StoreContext, WriteValidator};
use crate::lock::LockCoordinator;
use crate::scan::PaginatedScanner;
use crate::store::EntityStore;
use std::sync::Arc;
use tabletx_adapters::Transport;
use tabletx_core::{Clock, ConfigError, EngineConfig, SystemClock};

/// Entry point handing out the store, batch writer, scanner and lock
/// coordinator over one shared transport
pub struct TableEngine<T, C = SystemClock> {
    ctx: Arc<StoreContext<T, C>>,
}

impl<T, C> Clone for TableEngine<T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T: Transport> TableEngine<T, SystemClock> {
    /// Engine with default configuration and the system clock
    pub fn new(transport: T) -> Self {
        Self {
            ctx: Arc::new(StoreContext::new(
                transport,
                SystemClock,
                EngineConfig::default(),
                Vec::new(),
            )),
        }
    }

    pub fn builder(transport: T) -> EngineBuilder<T, SystemClock> {
        EngineBuilder {
            transport,
            clock: SystemClock,
            config: EngineConfig::default(),
            validators: Vec::new(),
        }
    }
}

impl<T: Transport, C: Clock> TableEngine<T, C> {
    pub fn store(&self) -> EntityStore<T, C> {
        EntityStore::new(Arc::clone(&self.ctx))
    }

    pub fn batch_writer(&self) -> BatchWriter<T, C> {
        BatchWriter::new(Arc::clone(&self.ctx))
    }

    pub fn scanner(&self) -> PaginatedScanner<T, C> {
        PaginatedScanner::new(Arc::clone(&self.ctx))
    }

    pub fn locks(&self) -> LockCoordinator<T, C> {
        LockCoordinator::new(self.store())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn transport(&self) -> &T {
        &self.ctx.transport
    }
}

/// Builder for [`TableEngine`]
pub struct EngineBuilder<T, C> {
    transport: T,
    clock: C,
    config: EngineConfig,
    validators: Vec<Arc<dyn WriteValidator>>,
}

impl<T: Transport, C: Clock> EngineBuilder<T, C> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock<C2: Clock>(self, clock: C2) -> EngineBuilder<T, C2> {
        EngineBuilder {
            transport: self.transport,
            clock,
            config: self.config,
            validators: self.validators,
        }
    }

    /// Add a check run against every application write
    pub fn validator(mut self, validator: impl WriteValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> Result<TableEngine<T, C>, ConfigError> {
        self.config.validate()?;
        tracing::debug!(
            batch_size = self.config.batch.max_batch_size,
            page_size = self.config.scan.page_size,
            validators = self.validators.len(),
            "engine configured"
        );
        Ok(TableEngine {
            ctx: Arc::new(StoreContext::new(
                self.transport,
                self.clock,
                self.config,
                self.validators,
            )),
        })
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
