// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entities and engine setup shared by unit tests

use crate::engine::TableEngine;
use std::time::Duration;
use tabletx_adapters::FakeTransport;
use tabletx_core::entity::{optional_str, required_i64, required_str};
use tabletx_core::{
    ContentionRetry, EngineConfig, Entity, EntityKeys, FakeClock, Fields, KeyCodec, MappingError,
    TransientRetry,
};

/// Named counter in a single partition
#[derive(Clone, Debug, PartialEq)]
pub struct Counter {
    pub name: String,
    pub count: i64,
    pub note: Option<String>,
}

impl Counter {
    pub fn new(name: &str, count: i64) -> Self {
        Self {
            name: name.to_string(),
            count,
            note: None,
        }
    }
}

impl KeyCodec for Counter {
    type Id = String;

    fn encode_keys(id: &String) -> EntityKeys {
        EntityKeys::new("counters", id.clone())
    }
}

impl Entity for Counter {
    const TABLE: &'static str = "Counters";

    fn id(&self) -> String {
        self.name.clone()
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("count".to_string(), self.count.into());
        if let Some(note) = &self.note {
            fields.insert("note".to_string(), note.as_str().into());
        }
        fields
    }

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError> {
        Ok(Self {
            name: keys.row_key.clone(),
            count: required_i64(fields, "count")?,
            note: optional_str(fields, "note")?,
        })
    }

    fn blank(id: &String) -> Self {
        Self::new(id, 0)
    }
}

/// Value keyed by an explicit (partition, row) pair
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub partition: String,
    pub key: String,
    pub label: String,
}

impl Item {
    pub fn new(partition: &str, key: &str, label: &str) -> Self {
        Self {
            partition: partition.to_string(),
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

impl KeyCodec for Item {
    type Id = (String, String);

    fn encode_keys(id: &(String, String)) -> EntityKeys {
        EntityKeys::new(id.0.clone(), id.1.clone())
    }
}

impl Entity for Item {
    const TABLE: &'static str = "Items";

    fn id(&self) -> (String, String) {
        (self.partition.clone(), self.key.clone())
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("label".to_string(), self.label.as_str().into());
        fields
    }

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError> {
        Ok(Self {
            partition: keys.partition_key.clone(),
            key: keys.row_key.clone(),
            label: required_str(fields, "label")?,
        })
    }

    fn blank(id: &(String, String)) -> Self {
        Self::new(&id.0, &id.1, "")
    }
}

/// Configuration with millisecond backoffs
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.transient = TransientRetry {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        max_attempts: 5,
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
