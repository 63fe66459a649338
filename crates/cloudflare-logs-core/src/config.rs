// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::client::DEFAULT_API_URL;
use crate::error::PollError;
use std::env;
use std::path::PathBuf;

/// Dot-paths projected into outgoing events when no explicit list is
/// configured. Field names come from the Cloudflare log-retrieval docs.
pub const DEFAULT_FIELDS: [&str; 20] = [
    "timestamp",
    "zoneId",
    "ownerId",
    "zoneName",
    "rayId",
    "securityLevel",
    "client.ip",
    "client.country",
    "client.sslProtocol",
    "client.sslCipher",
    "client.deviceType",
    "client.asNum",
    "clientRequest.bytes",
    "clientRequest.httpHost",
    "clientRequest.httpMethod",
    "clientRequest.uri",
    "clientRequest.httpProtocol",
    "clientRequest.userAgent",
    "edgeResponse.status",
    "edgeResponse.bytes",
];

const DEFAULT_CHECKPOINT_PATH: &str = "/tmp/cloudflare_logs_checkpoint.json";
const DEFAULT_POLL_TIME_SECS: u64 = 15;
const DEFAULT_POLL_INTERVAL_SECS: i64 = 120;
const DEFAULT_START_FROM_SECS_AGO: i64 = 1200;
const DEFAULT_BATCH_SIZE: u32 = 1000;

/// Configuration for one poller instance (one domain).
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Email half of the Cloudflare API credentials.
    pub auth_email: String,
    /// Key half of the Cloudflare API credentials.
    pub auth_key: String,
    /// Domain whose access logs are polled.
    pub domain: String,
    /// Base URL of the Cloudflare API (overridable for integration tests).
    pub api_url: String,
    /// Location of the persisted checkpoint file.
    pub checkpoint_path: PathBuf,
    /// Seconds to wait between empty-result polls.
    pub poll_time: u64,
    /// Width of a timestamp query window, in seconds.
    pub poll_interval: i64,
    /// Cold-start lookback: the first window starts this many seconds ago.
    pub start_from_secs_ago: i64,
    /// Record count requested on ID-cursor queries.
    pub batch_size: u32,
    /// Dot-paths projected into outgoing events.
    pub fields: Vec<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            auth_email: String::new(),
            auth_key: String::new(),
            domain: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            poll_time: DEFAULT_POLL_TIME_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            start_from_secs_ago: DEFAULT_START_FROM_SECS_AGO,
            batch_size: DEFAULT_BATCH_SIZE,
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl PollerConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, PollError> {
        let defaults = Self::default();

        let auth_email = env::var("CF_AUTH_EMAIL").unwrap_or_default();
        let auth_key = env::var("CF_AUTH_KEY").unwrap_or_default();
        let domain = env::var("CF_DOMAIN").unwrap_or_default();
        let api_url = env::var("CF_API_URL").unwrap_or(defaults.api_url);
        let checkpoint_path = env::var("CF_CHECKPOINT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.checkpoint_path);
        let poll_time = env::var("CF_POLL_TIME")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(defaults.poll_time);
        let poll_interval = env::var("CF_POLL_INTERVAL")
            .ok()
            .and_then(|val| val.parse::<i64>().ok())
            .unwrap_or(defaults.poll_interval);
        let start_from_secs_ago = env::var("CF_START_FROM_SECS_AGO")
            .ok()
            .and_then(|val| val.parse::<i64>().ok())
            .unwrap_or(defaults.start_from_secs_ago);
        let batch_size = env::var("CF_BATCH_SIZE")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.batch_size);
        let fields = env::var("CF_FIELDS")
            .ok()
            .map(|val| {
                val.split(',')
                    .map(|field| field.trim().to_string())
                    .filter(|field| !field.is_empty())
                    .collect::<Vec<String>>()
            })
            .filter(|fields| !fields.is_empty())
            .unwrap_or(defaults.fields);

        let config = Self {
            auth_email,
            auth_key,
            domain,
            api_url,
            checkpoint_path,
            poll_time,
            poll_interval,
            start_from_secs_ago,
            batch_size,
            fields,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PollError> {
        if self.auth_email.trim().is_empty() {
            return Err(PollError::InvalidConfig(
                "CF_AUTH_EMAIL must be set".to_string(),
            ));
        }
        if self.auth_key.trim().is_empty() {
            return Err(PollError::InvalidConfig(
                "CF_AUTH_KEY must be set".to_string(),
            ));
        }
        if self.domain.trim().is_empty() {
            return Err(PollError::InvalidConfig("CF_DOMAIN must be set".to_string()));
        }
        if self.poll_interval <= 0 {
            return Err(PollError::InvalidConfig(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        if self.start_from_secs_ago <= 0 {
            return Err(PollError::InvalidConfig(
                "cold-start lookback must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PollError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(PollError::InvalidConfig(
                "at least one projection field is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> PollerConfig {
        PollerConfig {
            auth_email: "ops@example.com".to_string(),
            auth_key: "secret".to_string(),
            domain: "example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_misses_credentials() {
        assert!(PollerConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = PollerConfig {
            poll_interval: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = PollerConfig {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_field_list() {
        let config = PollerConfig {
            fields: Vec::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_credentials() {
        env::remove_var("CF_AUTH_EMAIL");
        env::remove_var("CF_AUTH_KEY");
        env::remove_var("CF_DOMAIN");
        assert!(PollerConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        env::set_var("CF_AUTH_EMAIL", "ops@example.com");
        env::set_var("CF_AUTH_KEY", "secret");
        env::set_var("CF_DOMAIN", "example.com");
        env::set_var("CF_POLL_INTERVAL", "60");
        env::set_var("CF_BATCH_SIZE", "250");
        env::set_var("CF_FIELDS", "timestamp,rayId, client.ip");

        let config = PollerConfig::from_env().expect("config should be valid");
        assert_eq!(config.poll_interval, 60);
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.fields, vec!["timestamp", "rayId", "client.ip"]);
        assert_eq!(config.poll_time, DEFAULT_POLL_TIME_SECS);

        env::remove_var("CF_AUTH_EMAIL");
        env::remove_var("CF_AUTH_KEY");
        env::remove_var("CF_DOMAIN");
        env::remove_var("CF_POLL_INTERVAL");
        env::remove_var("CF_BATCH_SIZE");
        env::remove_var("CF_FIELDS");
    }

    #[test]
    #[serial]
    fn test_from_env_unparseable_number_falls_back_to_default() {
        env::set_var("CF_AUTH_EMAIL", "ops@example.com");
        env::set_var("CF_AUTH_KEY", "secret");
        env::set_var("CF_DOMAIN", "example.com");
        env::set_var("CF_BATCH_SIZE", "not-a-number");

        let config = PollerConfig::from_env().expect("config should be valid");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);

        env::remove_var("CF_AUTH_EMAIL");
        env::remove_var("CF_AUTH_KEY");
        env::remove_var("CF_DOMAIN");
        env::remove_var("CF_BATCH_SIZE");
    }
}
