// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared entities and engine setup for the behavioural specs.

#![allow(dead_code)]

use std::time::Duration;
use tabletx_core::entity::{required_i64, required_str};
use tabletx_core::{
    ContentionRetry, EngineConfig, EntityKeys, FakeClock, Fields, KeyCodec, MappingError,
    TransientRetry,
};
use tabletx_engine::TableEngine;

pub use tabletx_core::Entity;

pub use tabletx_adapters::{FakeTransport, MemoryTransport, OpKind, TransportCall, TransportError};

/// Account balance keyed by owner, all in one partition
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub owner: String,
    pub balance: i64,
}

impl Account {
    pub fn new(owner: &str, balance: i64) -> Self {
        Self {
            owner: owner.to_string(),
            balance,
        }
    }
}

impl KeyCodec for Account {
    type Id = String;

    fn encode_keys(id: &String) -> EntityKeys {
        EntityKeys::new("accounts", id.clone())
    }
}

impl Entity for Account {
    const TABLE: &'static str = "Accounts";

    fn id(&self) -> String {
        self.owner.clone()
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("balance".to_string(), self.balance.into());
        fields
    }

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError> {
        Ok(Self {
            owner: keys.row_key.clone(),
            balance: required_i64(fields, "balance")?,
        })
    }

    fn blank(id: &String) -> Self {
        Self::new(id, 0)
    }
}

/// Sensor reading partitioned by sensor, ordered by sequence number
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub sensor: String,
    pub seq: u32,
    pub unit: String,
}

impl Reading {
    pub fn new(sensor: &str, seq: u32) -> Self {
        Self {
            sensor: sensor.to_string(),
            seq,
            unit: "kPa".to_string(),
        }
    }
}

impl KeyCodec for Reading {
    type Id = (String, u32);

    fn encode_keys(id: &(String, u32)) -> EntityKeys {
        EntityKeys::new(id.0.clone(), format!("{:08}", id.1))
    }
}

impl Entity for Reading {
    const TABLE: &'static str = "Readings";

    fn id(&self) -> (String, u32) {
        (self.sensor.clone(), self.seq)
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("unit".to_string(), self.unit.as_str().into());
        fields
    }

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError> {
        let seq = keys
            .row_key
            .parse()
            .map_err(|_| MappingError::Invalid {
                field: "row_key".to_string(),
                message: format!("not a sequence number: {}", keys.row_key),
            })?;
        Ok(Self {
            sensor: keys.partition_key.clone(),
            seq,
            unit: required_str(fields, "unit")?,
        })
    }

    fn blank(id: &(String, u32)) -> Self {
        Self::new(&id.0, id.1)
    }
}

/// Configuration with millisecond backoffs
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.transient = TransientRetry {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_attempts: 4,
    };
    config.retry.contention = ContentionRetry {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts: None,
    };
    config
}

pub fn engine(fake: &FakeTransport) -> TableEngine<FakeTransport, FakeClock> {
    engine_with(fake, fast_config())
}

pub fn engine_with(
    fake: &FakeTransport,
    config: EngineConfig,
) -> TableEngine<FakeTransport, FakeClock> {
    TableEngine::builder(fake.clone())
        .config(config)
        .clock(FakeClock::new())
        .build()
        .unwrap()
}

/// Fake over a store that already has `tables`
pub fn fake_with(tables: &[&str]) -> FakeTransport {
    let memory = MemoryTransport::new();
    for table in tables {
        memory.ensure_table(table);
    }
    FakeTransport::over(memory)
}
