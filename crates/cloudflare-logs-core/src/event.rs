// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Projection of raw log records into downstream events.

use serde::Serialize;
use serde_json::{Map, Value};

/// Normalized output unit delivered to the downstream sink.
///
/// Serializes flat: `host` plus one underscore-joined key per configured
/// dot-path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub host: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Projects the configured dot-paths out of a record.
///
/// A path whose segments cannot be fully resolved (missing key, or traversal
/// through a non-object) projects as an empty JSON object, so events keep a
/// stable key set regardless of which optional fields the provider filled in.
pub fn project(record: &Value, fields: &[String], host: &str) -> LogEvent {
    let mut projected = Map::new();
    for field in fields {
        let mut cursor = Some(record);
        for part in field.split('.') {
            cursor = cursor.and_then(|value| value.get(part));
        }
        let value = cursor
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        projected.insert(field.replace('.', "_"), value);
    }
    LogEvent {
        host: host.to_string(),
        fields: projected,
    }
}
