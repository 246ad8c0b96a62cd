use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::reliability::RetryConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Tuning knobs for one streaming session.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Item-count ceiling per frame and per in-flight window until the
    /// server suggests otherwise via backoff messages.
    pub initial_batch_size: usize,

    /// How long one queue pull waits before re-checking session signals.
    pub pull_timeout: Duration,

    /// Sleep interval for cooperative waits (started gate, in-flight
    /// window, admission gate).
    pub poll_interval: Duration,

    /// Conservative per-item framing overhead added to each encoded size so
    /// an emitted frame stays under the transport's hard limit.
    pub per_item_overhead: usize,

    /// Proactively renew the stream after this long, if set. This is a
    /// server/transport-imposed maximum connection lifetime, not a failure
    /// path.
    pub max_stream_lifetime: Option<Duration>,

    /// Reconnect backoff policy applied after a server-driven shutdown.
    pub retry: RetryConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 1000,
            pull_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            per_item_overhead: 64,
            max_stream_lifetime: None,
            retry: RetryConfig::default(),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "initial_batch_size must be positive".to_string(),
            ));
        }
        if self.pull_timeout.is_zero() || self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "pull_timeout and poll_interval must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// Serde support mirrors the retry config so embedders can persist tuning.
impl Serialize for StreamConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ConfigRepr::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StreamConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ConfigRepr::deserialize(deserializer)?.into())
    }
}

#[derive(Serialize, Deserialize)]
struct ConfigRepr {
    initial_batch_size: usize,
    pull_timeout_ms: u64,
    poll_interval_ms: u64,
    per_item_overhead: usize,
    max_stream_lifetime_ms: Option<u64>,
    retry: RetryConfig,
}

impl From<&StreamConfig> for ConfigRepr {
    fn from(config: &StreamConfig) -> Self {
        Self {
            initial_batch_size: config.initial_batch_size,
            pull_timeout_ms: config.pull_timeout.as_millis() as u64,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
            per_item_overhead: config.per_item_overhead,
            max_stream_lifetime_ms: config.max_stream_lifetime.map(|d| d.as_millis() as u64),
            retry: config.retry.clone(),
        }
    }
}

impl From<ConfigRepr> for StreamConfig {
    fn from(repr: ConfigRepr) -> Self {
        Self {
            initial_batch_size: repr.initial_batch_size,
            pull_timeout: Duration::from_millis(repr.pull_timeout_ms),
            poll_interval: Duration::from_millis(repr.poll_interval_ms),
            per_item_overhead: repr.per_item_overhead,
            max_stream_lifetime: repr.max_stream_lifetime_ms.map(Duration::from_millis),
            retry: repr.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = StreamConfig {
            initial_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = StreamConfig {
            initial_batch_size: 42,
            max_stream_lifetime: Some(Duration::from_secs(300)),
            ..Default::default()
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: StreamConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.initial_batch_size, 42);
        assert_eq!(decoded.max_stream_lifetime, Some(Duration::from_secs(300)));
    }
}
