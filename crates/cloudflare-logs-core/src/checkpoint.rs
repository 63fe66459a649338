// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable resumption state.
//!
//! The checkpoint is the only state that survives process restarts. It is
//! loaded at the start of every poll iteration, mutated in memory while the
//! batch is processed, and persisted at the end of the iteration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Resumable position in the remote log stream.
///
/// `default_start_time` is derived from the wall clock each cycle (now minus
/// the configured lookback) and is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of the last record delivered downstream.
    pub last_ray_id: Option<String>,
    /// Timestamp (epoch seconds) of the last record delivered downstream.
    pub last_timestamp: Option<i64>,
    /// Identifier that marks the overlap boundary of the current batch.
    pub first_ray_id: Option<String>,
    /// Window start of the current batch's query.
    pub first_timestamp: Option<i64>,
    #[serde(skip)]
    pub default_start_time: i64,
}

/// Errors emitted by checkpoint stores.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence interface injected into the poll loop controller.
///
/// `load` returns a cold-start checkpoint when no state was ever written;
/// a missing or corrupt file is not an error.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> Result<Checkpoint, CheckpointError>;
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

impl<T: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Checkpoint, CheckpointError> {
        (**self).load()
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        (**self).save(checkpoint)
    }
}

/// JSON-file-backed store.
///
/// Writes go through a temp file and an atomic rename so a crash mid-write
/// cannot leave unparseable state behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Checkpoint::default());
            }
            Err(err) => return Err(CheckpointError::Io(err)),
        };
        if content.trim().is_empty() {
            return Ok(Checkpoint::default());
        }
        match serde_json::from_str(&content) {
            Ok(checkpoint) => Ok(checkpoint),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    %err,
                    "checkpoint file is corrupt, falling back to cold start"
                );
                Ok(Checkpoint::default())
            }
        }
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.temp_path();
        fs::write(&temp_path, serde_json::to_string(checkpoint)?)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store for embedders and deterministic tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    inner: Mutex<Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            inner: Mutex::new(checkpoint),
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Checkpoint, CheckpointError> {
        #[allow(clippy::expect_used)]
        Ok(self.inner.lock().expect("lock poisoned").clone())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        #[allow(clippy::expect_used)]
        let mut guard = self.inner.lock().expect("lock poisoned");
        *guard = checkpoint.clone();
        Ok(())
    }
}
