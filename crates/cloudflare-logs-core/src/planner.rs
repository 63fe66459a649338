// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cursor/query planning.
//!
//! Pure functions over [`Checkpoint`] values: no I/O, no clock access, no
//! hidden state. The controller feeds in the loaded checkpoint and applies
//! whatever comes back.
//!
//! Timestamp continuation takes priority over ID continuation. The
//! provider's `count` parameter on ID-cursor queries proved unreliable, so
//! the ID cursor only drives the query when no timestamp survives (first
//! run after an upgrade from the ID-only checkpoint format).

use crate::checkpoint::Checkpoint;
use tracing::{debug, info};

/// How the next query continues the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// No usable cursor; start from the configured lookback.
    ColdStart,
    /// Continue from the last delivered record's identifier.
    IdContinuation { start_id: String },
    /// Continue from the last delivered record's timestamp.
    TimestampWindow { start: i64 },
}

/// Request parameters for one log-retrieval call. The two forms are
/// mutually exclusive per the provider API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
    IdCursor { start_id: String, count: u32 },
    TimeWindow { start: i64, end: i64 },
}

impl QueryParams {
    /// Renders the parameters as URL query pairs.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        match self {
            QueryParams::IdCursor { start_id, count } => vec![
                ("start_id", start_id.clone()),
                ("count", count.to_string()),
            ],
            QueryParams::TimeWindow { start, end } => {
                vec![("start", start.to_string()), ("end", end.to_string())]
            }
        }
    }
}

/// Whether the controller should pause before the next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Re-poll immediately; the stream is behind real time.
    Continue,
    /// Wait the configured poll time before the next iteration.
    Sleep,
}

/// Selects the continuation mode for the given checkpoint.
pub fn select_mode(checkpoint: &Checkpoint) -> QueryMode {
    if let Some(start) = checkpoint.last_timestamp {
        QueryMode::TimestampWindow { start }
    } else if let Some(start_id) = checkpoint.last_ray_id.clone() {
        QueryMode::IdContinuation { start_id }
    } else {
        QueryMode::ColdStart
    }
}

/// Computes the next query and the provisional checkpoint that goes with it.
///
/// The provisional checkpoint records which boundary the query overlaps
/// (`first_ray_id` or `first_timestamp`) and clears both `last_*` fields;
/// they are repopulated from the retrieved batch, or stay empty when the
/// batch turns out to be empty.
pub fn plan(checkpoint: &Checkpoint, poll_interval: i64, batch_size: u32) -> (QueryParams, Checkpoint) {
    let mut next = checkpoint.clone();
    let params = match select_mode(checkpoint) {
        QueryMode::TimestampWindow { start } => {
            info!(last_timestamp = start, "continuing from previous timestamp");
            next.first_timestamp = Some(start);
            next.first_ray_id = None;
            QueryParams::TimeWindow {
                start,
                end: start + poll_interval,
            }
        }
        QueryMode::IdContinuation { start_id } => {
            info!(last_ray_id = %start_id, "continuing from previous ray ID");
            next.first_ray_id = Some(start_id.clone());
            next.first_timestamp = None;
            QueryParams::IdCursor {
                start_id,
                count: batch_size,
            }
        }
        QueryMode::ColdStart => {
            let start = checkpoint.default_start_time;
            debug!(start, "no previous cursor, starting from lookback window");
            next.first_timestamp = Some(start);
            next.first_ray_id = None;
            QueryParams::TimeWindow {
                start,
                end: start + poll_interval,
            }
        }
    };
    next.last_ray_id = None;
    next.last_timestamp = None;
    (params, next)
}

/// Decides whether to sleep or continue, advancing the window when catching up.
///
/// When a timestamp-window query yields no new records the window moves
/// forward by one poll interval, but only while it stays at or behind
/// `default_start_time` (now minus the lookback). Racing past that bound
/// would poll a window the provider has not finished producing yet.
pub fn decide_pacing(checkpoint: &mut Checkpoint, poll_interval: i64) -> Pacing {
    match checkpoint.last_timestamp {
        None => {
            if let Some(first) = checkpoint.first_timestamp {
                let advanced = first + poll_interval;
                if advanced <= checkpoint.default_start_time {
                    info!(
                        seconds = poll_interval,
                        "no results in window, advancing start timestamp"
                    );
                    checkpoint.last_timestamp = Some(advanced);
                    return Pacing::Continue;
                }
            }
            Pacing::Sleep
        }
        Some(last) if last < checkpoint.default_start_time => Pacing::Continue,
        Some(_) => Pacing::Sleep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_takes_priority_over_ray_id() {
        let checkpoint = Checkpoint {
            last_ray_id: Some("2ea5b3b0f7a94c8e".to_string()),
            last_timestamp: Some(1_717_000_000),
            ..Default::default()
        };

        let (params, _) = plan(&checkpoint, 120, 1000);
        assert_eq!(
            params,
            QueryParams::TimeWindow {
                start: 1_717_000_000,
                end: 1_717_000_120,
            }
        );
    }

    #[test]
    fn ray_id_drives_query_when_no_timestamp() {
        let checkpoint = Checkpoint {
            last_ray_id: Some("2ea5b3b0f7a94c8e".to_string()),
            ..Default::default()
        };

        let (params, next) = plan(&checkpoint, 120, 500);
        assert_eq!(
            params,
            QueryParams::IdCursor {
                start_id: "2ea5b3b0f7a94c8e".to_string(),
                count: 500,
            }
        );
        assert_eq!(next.first_ray_id.as_deref(), Some("2ea5b3b0f7a94c8e"));
        assert_eq!(next.first_timestamp, None);
    }

    #[test]
    fn cold_start_uses_default_start_time() {
        let checkpoint = Checkpoint {
            default_start_time: 1_717_000_000,
            ..Default::default()
        };

        let (params, next) = plan(&checkpoint, 120, 1000);
        assert_eq!(
            params,
            QueryParams::TimeWindow {
                start: 1_717_000_000,
                end: 1_717_000_120,
            }
        );
        assert_eq!(next.first_timestamp, Some(1_717_000_000));
        assert_eq!(next.first_ray_id, None);
    }

    #[test]
    fn plan_clears_last_fields_in_provisional_checkpoint() {
        let checkpoint = Checkpoint {
            last_ray_id: Some("2ea5b3b0f7a94c8e".to_string()),
            last_timestamp: Some(1_717_000_000),
            ..Default::default()
        };

        let (_, next) = plan(&checkpoint, 120, 1000);
        assert_eq!(next.last_ray_id, None);
        assert_eq!(next.last_timestamp, None);
        assert_eq!(next.first_timestamp, Some(1_717_000_000));
    }

    #[test]
    fn select_mode_is_cold_without_cursors() {
        assert_eq!(select_mode(&Checkpoint::default()), QueryMode::ColdStart);
    }

    #[test]
    fn catch_up_advances_window_within_bound() {
        let first = 1_717_000_000;
        let mut checkpoint = Checkpoint {
            first_timestamp: Some(first),
            default_start_time: first + 200,
            ..Default::default()
        };

        let pacing = decide_pacing(&mut checkpoint, 120);
        assert_eq!(pacing, Pacing::Continue);
        assert_eq!(checkpoint.last_timestamp, Some(first + 120));
    }

    #[test]
    fn catch_up_sleeps_when_bound_violated() {
        let first = 1_717_000_000;
        let mut checkpoint = Checkpoint {
            first_timestamp: Some(first),
            default_start_time: first + 100,
            ..Default::default()
        };

        let pacing = decide_pacing(&mut checkpoint, 120);
        assert_eq!(pacing, Pacing::Sleep);
        assert_eq!(checkpoint.last_timestamp, None);
    }

    #[test]
    fn id_mode_batches_with_no_results_sleep() {
        // No first_timestamp to advance from: the previous query was an
        // ID-cursor query.
        let mut checkpoint = Checkpoint {
            first_ray_id: Some("2ea5b3b0f7a94c8e".to_string()),
            default_start_time: 1_717_000_000,
            ..Default::default()
        };

        assert_eq!(decide_pacing(&mut checkpoint, 120), Pacing::Sleep);
    }

    #[test]
    fn continues_without_sleep_while_behind_real_time() {
        let mut checkpoint = Checkpoint {
            last_timestamp: Some(1_716_999_000),
            default_start_time: 1_717_000_000,
            ..Default::default()
        };

        assert_eq!(decide_pacing(&mut checkpoint, 120), Pacing::Continue);
    }

    #[test]
    fn sleeps_once_caught_up_to_real_time() {
        let mut checkpoint = Checkpoint {
            last_timestamp: Some(1_717_000_050),
            default_start_time: 1_717_000_000,
            ..Default::default()
        };

        assert_eq!(decide_pacing(&mut checkpoint, 120), Pacing::Sleep);
    }

    #[test]
    fn query_params_render_as_url_pairs() {
        let id = QueryParams::IdCursor {
            start_id: "abc".to_string(),
            count: 1000,
        };
        assert_eq!(
            id.to_query(),
            vec![("start_id", "abc".to_string()), ("count", "1000".to_string())]
        );

        let window = QueryParams::TimeWindow {
            start: 100,
            end: 220,
        };
        assert_eq!(
            window.to_query(),
            vec![("start", "100".to_string()), ("end", "220".to_string())]
        );
    }
}
