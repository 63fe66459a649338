// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The poll loop controller.
//!
//! One sequential worker per configured domain. Each iteration loads the
//! checkpoint, plans the next query, fetches and parses a batch, emits the
//! surviving records downstream, advances the checkpoint, and decides
//! whether to sleep or keep catching up. Provider API errors degrade the
//! iteration to an empty batch; anything else terminates the run.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::client::CloudflareClient;
use crate::config::PollerConfig;
use crate::error::PollError;
use crate::event::{self, LogEvent};
use crate::parse;
use crate::planner::{self, Pacing};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run-until-stopped poller for one domain.
pub struct LogPoller<S> {
    client: CloudflareClient,
    store: S,
    config: PollerConfig,
    host: String,
    events: mpsc::Sender<LogEvent>,
}

impl<S: CheckpointStore> LogPoller<S> {
    pub fn new(
        client: CloudflareClient,
        store: S,
        config: PollerConfig,
        host: String,
        events: mpsc::Sender<LogEvent>,
    ) -> Self {
        Self {
            client,
            store,
            config,
            host,
            events,
        }
    }

    /// Runs the poll loop until the token is cancelled or a fatal error
    /// occurs. Zone resolution happens once up front; failing it fails the
    /// whole run.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), PollError> {
        info!(domain = %self.config.domain, "starting Cloudflare log poller");
        let zone_id = self.client.zone_id(&self.config.domain).await?;
        info!(zone_id = %zone_id, domain = %self.config.domain, "resolved zone");

        while !shutdown.is_cancelled() {
            if let Err(err) = self.run_iteration(&zone_id, &shutdown).await {
                if shutdown.is_cancelled() {
                    debug!("stop requested, leaving poll loop");
                    break;
                }
                error!(%err, "poll iteration failed");
                return Err(err);
            }
        }
        info!("poll loop stopped");
        Ok(())
    }

    /// One POLLING iteration: load → plan → fetch → emit → persist → pace.
    async fn run_iteration(
        &self,
        zone_id: &str,
        shutdown: &CancellationToken,
    ) -> Result<(), PollError> {
        let mut checkpoint = self.store.load()?;
        checkpoint.default_start_time = unix_now() - self.config.start_from_secs_ago;
        debug!(?checkpoint, "loaded checkpoint");

        let (params, mut next) =
            planner::plan(&checkpoint, self.config.poll_interval, self.config.batch_size);

        let entries = match self.client.fetch_log_lines(zone_id, &params).await {
            Ok(body) => parse::parse_log_lines(&body),
            Err(PollError::Api(api)) => {
                for detail in &api.errors {
                    error!(
                        code = detail.code,
                        message = %detail.message,
                        "Cloudflare error"
                    );
                }
                error!(
                    status = api.status_code,
                    url = %api.url,
                    "Cloudflare API call failed, treating batch as empty"
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        info!(count = entries.len(), "received log entries");

        if entries.len() <= 1 {
            // A single returned record is the cursor-boundary echo of the
            // record we asked for; there is nothing new to deliver. Keep
            // the stored state untouched and retry after a full pause.
            info!("not enough entries to process, retrying after pause");
            self.pause(shutdown).await;
            return Ok(());
        }

        for entry in &entries {
            self.process_entry(&mut next, entry).await?;
        }

        let pacing = planner::decide_pacing(&mut next, self.config.poll_interval);
        if let Err(err) = self.store.save(&next) {
            error!(
                %err,
                "failed to persist checkpoint, entries may be reprocessed after a restart"
            );
        }
        if pacing == Pacing::Sleep {
            self.pause(shutdown).await;
        }
        Ok(())
    }

    /// Emits one record downstream unless it is the overlap boundary, and
    /// folds its identity into the in-memory checkpoint.
    async fn process_entry(
        &self,
        checkpoint: &mut Checkpoint,
        entry: &Value,
    ) -> Result<(), PollError> {
        let ray_id = entry.get("rayId").and_then(Value::as_str);
        if let (Some(boundary), Some(ray)) = (checkpoint.first_ray_id.as_deref(), ray_id) {
            if boundary == ray {
                // Already delivered at the tail of the previous batch.
                debug!(ray_id = ray, "skipping overlap boundary record");
                return Ok(());
            }
        }

        let event = event::project(entry, &self.config.fields, &self.host);
        self.events
            .send(event)
            .await
            .map_err(|_| PollError::SinkClosed)?;

        if let Some(ray) = ray_id {
            checkpoint.last_ray_id = Some(ray.to_string());
        }
        if let Some(nanos) = entry.get("timestamp").and_then(Value::as_i64) {
            // Cloudflare provides the timestamp in nanoseconds.
            checkpoint.last_timestamp = Some(nanos / 1_000_000_000);
        }
        Ok(())
    }

    /// Cancellable pacing pause.
    async fn pause(&self, shutdown: &CancellationToken) {
        debug!(
            seconds = self.config.poll_time,
            "waiting before requesting data from Cloudflare again"
        );
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(self.config.poll_time)) => {}
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::client::Auth;
    use serde_json::json;

    fn test_poller(
        events: mpsc::Sender<LogEvent>,
    ) -> LogPoller<MemoryCheckpointStore> {
        let auth = Auth {
            email: "ops@example.com".to_string(),
            key: "secret".to_string(),
        };
        let client = CloudflareClient::new("http://127.0.0.1:9", &auth).expect("client");
        let config = PollerConfig {
            auth_email: auth.email.clone(),
            auth_key: auth.key.clone(),
            domain: "example.com".to_string(),
            fields: vec!["rayId".to_string(), "client.ip".to_string()],
            ..Default::default()
        };
        LogPoller::new(
            client,
            MemoryCheckpointStore::default(),
            config,
            "collector-1".to_string(),
            events,
        )
    }

    #[tokio::test]
    async fn boundary_record_is_skipped_and_does_not_advance_cursor() {
        let (tx, mut rx) = mpsc::channel(8);
        let poller = test_poller(tx);
        let mut checkpoint = Checkpoint {
            first_ray_id: Some("boundary".to_string()),
            ..Default::default()
        };

        let entry = json!({"rayId": "boundary", "timestamp": 1_717_000_000_000_000_000_i64});
        poller
            .process_entry(&mut checkpoint, &entry)
            .await
            .expect("process");

        assert!(rx.try_recv().is_err());
        assert_eq!(checkpoint.last_ray_id, None);
        assert_eq!(checkpoint.last_timestamp, None);
    }

    #[tokio::test]
    async fn surviving_record_is_emitted_and_advances_cursor() {
        let (tx, mut rx) = mpsc::channel(8);
        let poller = test_poller(tx);
        let mut checkpoint = Checkpoint {
            first_ray_id: Some("boundary".to_string()),
            ..Default::default()
        };

        let entry = json!({
            "rayId": "2ea5b3b0f7a94c8e",
            "timestamp": 1_717_000_123_456_789_000_i64,
            "client": {"ip": "203.0.113.7"},
        });
        poller
            .process_entry(&mut checkpoint, &entry)
            .await
            .expect("process");

        let event = rx.try_recv().expect("event emitted");
        assert_eq!(event.host, "collector-1");
        assert_eq!(event.fields["rayId"], json!("2ea5b3b0f7a94c8e"));
        assert_eq!(event.fields["client_ip"], json!("203.0.113.7"));
        assert_eq!(checkpoint.last_ray_id.as_deref(), Some("2ea5b3b0f7a94c8e"));
        assert_eq!(checkpoint.last_timestamp, Some(1_717_000_123));
    }

    #[tokio::test]
    async fn closed_sink_is_fatal() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let poller = test_poller(tx);
        let mut checkpoint = Checkpoint::default();

        let entry = json!({"rayId": "abc", "timestamp": 0});
        let err = poller
            .process_entry(&mut checkpoint, &entry)
            .await
            .expect_err("should fail");
        assert!(matches!(err, PollError::SinkClosed));
    }
}
