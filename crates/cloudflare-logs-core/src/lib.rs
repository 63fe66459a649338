// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core building blocks of the Cloudflare log poller.
//!
//! The crate re-exports the pieces a host needs to run the poll loop:
//! configuration, the transport client, the checkpoint store, and the
//! controller itself. The cursor/query planner is exposed separately so
//! its planning and pacing rules stay unit-testable without any I/O.

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod parse;
pub mod planner;
pub mod poller;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use client::{Auth, CloudflareClient, DEFAULT_API_URL};
pub use config::PollerConfig;
pub use error::{ApiError, ApiErrorDetail, PollError};
pub use event::LogEvent;
pub use planner::{Pacing, QueryMode, QueryParams};
pub use poller::LogPoller;
