pub mod receiver;
pub mod retry;
pub mod sender;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use self::retry::RetryPolicy;

/// Rendezvous path used when the caller does not pick one.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/router.sock";

/// Default time a receiver waits for a sender to connect and deliver.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

fn validate_socket(socket: &std::path::Path) -> Result<(), Error> {
    if socket.as_os_str().is_empty() {
        return Err(Error::InvalidConfig("missing socket path".into()));
    }
    Ok(())
}

/// Configuration for the sending side of an evidence exchange.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Socket to deliver the evidence to.
    pub socket: PathBuf,

    /// Additional connection attempts after the first (default: 0).
    pub max_retries: u32,

    /// Wait between failed connection attempts (default: 1s).
    pub retry_interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_retries: policy.max_retries,
            retry_interval: policy.interval,
        }
    }
}

impl SenderConfig {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            ..Default::default()
        }
    }

    /// Create a builder for constructing a `SenderConfig`.
    pub fn builder() -> SenderConfigBuilder {
        SenderConfigBuilder::default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_interval)
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_socket(&self.socket)
    }
}

/// Builder for [`SenderConfig`].
#[derive(Debug, Clone, Default)]
pub struct SenderConfigBuilder {
    config: SenderConfig,
}

impl SenderConfigBuilder {
    pub fn socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.config.socket = socket.into();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.max_retries = policy.max_retries;
        self.config.retry_interval = policy.interval;
        self
    }

    /// Build the `SenderConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<SenderConfig, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the receiving side of an evidence exchange.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Socket to listen on. Must not exist yet.
    pub socket: PathBuf,

    /// Total budget for accepting a connection and reading its frame (default: 60s).
    pub timeout: Duration,

    /// Remove a leftover socket file before binding when no live receiver
    /// holds `<socket>.lock` (default: false).
    pub reclaim_stale_socket: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            timeout: DEFAULT_RECEIVE_TIMEOUT,
            reclaim_stale_socket: false,
        }
    }
}

impl ReceiverConfig {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            ..Default::default()
        }
    }

    /// Create a builder for constructing a `ReceiverConfig`.
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_socket(&self.socket)?;
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for [`ReceiverConfig`].
#[derive(Debug, Clone, Default)]
pub struct ReceiverConfigBuilder {
    config: ReceiverConfig,
}

impl ReceiverConfigBuilder {
    pub fn socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.config.socket = socket.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn reclaim_stale_socket(mut self, reclaim: bool) -> Self {
        self.config.reclaim_stale_socket = reclaim;
        self
    }

    /// Build the `ReceiverConfig`, validating that all values are sensible.
    pub fn build(self) -> Result<ReceiverConfig, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_defaults() {
        let cfg = SenderConfig::default();
        assert_eq!(cfg.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.retry_interval, Duration::from_secs(1));
        assert_eq!(cfg.retry_policy().max_attempts(), 1);
    }

    #[test]
    fn receiver_defaults() {
        let cfg = ReceiverConfig::default();
        assert_eq!(cfg.timeout, DEFAULT_RECEIVE_TIMEOUT);
        assert!(!cfg.reclaim_stale_socket);
    }

    #[test]
    fn builders_reject_empty_socket() {
        let err = SenderConfig::builder().socket("").build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = ReceiverConfig::builder().socket("").build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn receiver_builder_rejects_zero_timeout() {
        let err = ReceiverConfig::builder()
            .socket("/tmp/ev.sock")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("timeout")));
    }

    #[test]
    fn sender_builder_applies_policy() {
        let cfg = SenderConfig::builder()
            .socket("/tmp/ev.sock")
            .retry_policy(RetryPolicy::new(10, Duration::from_millis(10)))
            .build()
            .unwrap();
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.retry_interval, Duration::from_millis(10));
    }

    #[test]
    fn zero_retry_interval_is_allowed() {
        let cfg = SenderConfig::builder()
            .socket("/tmp/ev.sock")
            .retry_interval(Duration::ZERO)
            .build()
            .unwrap();
        assert!(cfg.retry_interval.is_zero());
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let cfg: SenderConfig =
            serde_json::from_str(r#"{"socket": "/run/evidence.sock", "max_retries": 60}"#)
                .unwrap();
        assert_eq!(cfg.socket, PathBuf::from("/run/evidence.sock"));
        assert_eq!(cfg.max_retries, 60);
        assert_eq!(cfg.retry_interval, Duration::from_secs(1));

        let cfg: ReceiverConfig = serde_json::from_str(
            r#"{"timeout": {"secs": 5, "nanos": 0}, "reclaim_stale_socket": true}"#,
        )
        .unwrap();
        assert_eq!(cfg.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert!(cfg.reclaim_stale_socket);
    }
}
