// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Newline-delimited JSON parsing for log-retrieval responses.

use serde_json::Value;
use tracing::warn;

/// Parses a newline-delimited JSON body into an ordered record sequence.
///
/// Blank lines are skipped. A line that is not valid JSON is dropped with a
/// warning; it never aborts the rest of the batch. An empty body yields an
/// empty sequence.
pub fn parse_log_lines(content: &str) -> Vec<Value> {
    let mut records = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(%err, line, "could not parse JSON out of log line, dropping it");
            }
        }
    }
    records
}
