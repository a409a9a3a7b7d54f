// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sample entity used by the stress scenarios

use tabletx_core::entity::{optional_str, required_i64};
use tabletx_core::{Entity, EntityKeys, Fields, KeyCodec, MappingError};

pub const PARTITION: &str = "stress";

#[derive(Clone, Debug)]
pub struct Counter {
    pub name: String,
    pub count: i64,
    /// Worker that wrote last
    pub last_writer: Option<String>,
}

impl KeyCodec for Counter {
    type Id = String;

    fn encode_keys(id: &String) -> EntityKeys {
        EntityKeys::new(PARTITION, id.clone())
    }
}

impl Entity for Counter {
    const TABLE: &'static str = "StressCounters";

    fn id(&self) -> String {
        self.name.clone()
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("count".to_string(), self.count.into());
        if let Some(writer) = &self.last_writer {
            fields.insert("last_writer".to_string(), writer.as_str().into());
        }
        fields
    }

    fn from_fields(keys: &EntityKeys, fields: &Fields) -> Result<Self, MappingError> {
        Ok(Self {
            name: keys.row_key.clone(),
            count: required_i64(fields, "count")?,
            last_writer: optional_str(fields, "last_writer")?,
        })
    }

    fn blank(id: &String) -> Self {
        Self {
            name: id.clone(),
            count: 0,
            last_writer: None,
        }
    }
}
