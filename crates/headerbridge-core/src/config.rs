//! Listener configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use headerbridge_core::config::{AcquisitionMode, ListenerBuilder};
//!
//! let config = ListenerBuilder::new()
//!     .name("rootchain")
//!     .poll_interval_ms(5_000)
//!     .mode(AcquisitionMode::Polling)
//!     .build_config();
//! assert_eq!(config.name, "rootchain");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ListenerError;

/// How the acquisition task learns about new headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Query the latest header on a fixed interval.
    #[default]
    Polling,
    /// Let the chain client push new heads. No fallback to polling.
    Subscription,
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

/// Configuration for one listener instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Listener name, used for log correlation and queue routes.
    pub name: String,
    /// Interval between "latest header" queries in polling mode (milliseconds).
    pub poll_interval_ms: u64,
    /// Acquisition strategy chosen at start.
    pub mode: AcquisitionMode,
    /// How long `stop` waits for both tasks to exit (milliseconds).
    pub shutdown_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: "listener".into(),
            poll_interval_ms: 5_000,
            mode: AcquisitionMode::Polling,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ListenerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject configurations the tasks cannot run with.
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.poll_interval_ms == 0 {
            return Err(ListenerError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ListenerError::InvalidConfig("name must not be empty".into()));
        }
        Ok(())
    }
}

/// Fluent builder for `ListenerConfig`.
#[derive(Default)]
pub struct ListenerBuilder {
    config: ListenerConfig,
}

impl ListenerBuilder {
    pub fn new() -> Self {
        Self {
            config: ListenerConfig::default(),
        }
    }

    /// Set the listener name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the polling interval.
    pub fn poll_interval(self, interval: Duration) -> Self {
        self.poll_interval_ms(interval.as_millis() as u64)
    }

    /// Choose polling or subscription.
    pub fn mode(mut self, mode: AcquisitionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the shutdown wait in milliseconds.
    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    /// Build the `ListenerConfig`.
    pub fn build_config(self) -> ListenerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ListenerBuilder::new().build_config();
        assert_eq!(cfg.name, "listener");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.mode, AcquisitionMode::Polling);
    }

    #[test]
    fn builder_custom() {
        let cfg = ListenerBuilder::new()
            .name("maticchain")
            .poll_interval(Duration::from_millis(250))
            .mode(AcquisitionMode::Subscription)
            .shutdown_timeout_ms(100)
            .build_config();

        assert_eq!(cfg.name, "maticchain");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.mode, AcquisitionMode::Subscription);
        assert_eq!(cfg.shutdown_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cfg = ListenerBuilder::new().poll_interval_ms(0).build_config();
        assert!(matches!(cfg.validate(), Err(ListenerError::InvalidConfig(_))));
        assert!(ListenerConfig::default().validate().is_ok());
    }

    #[test]
    fn mode_deserializes_lowercase() {
        let cfg: ListenerConfig = serde_json::from_str(
            r#"{"name":"root","poll_interval_ms":1000,"mode":"subscription","shutdown_timeout_ms":10}"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, AcquisitionMode::Subscription);
    }
}
