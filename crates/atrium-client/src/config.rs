//! Session configuration.

use std::time::Duration;

/// Configuration for a [`WorldSession`](crate::WorldSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the local position is published, in Hz. 0 disables
    /// position publishing entirely.
    ///
    /// Default: 10.
    pub publish_hz: u32,

    /// How many reconnection attempts to make after a transport loss
    /// before giving up for good.
    ///
    /// Default: 10.
    pub max_reconnect_attempts: u32,

    /// Base reconnect delay. Attempt `k` waits `k * reconnect_backoff`
    /// before dialing, so the waits grow linearly.
    ///
    /// Default: 1 second.
    pub reconnect_backoff: Duration,

    /// Media channels to declare as productions in the join request
    /// (e.g. `"audio"`). May be empty.
    pub channels: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            publish_hz: 10,
            max_reconnect_attempts: 10,
            reconnect_backoff: Duration::from_secs(1),
            channels: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Interval between position publishes, or `None` when publishing is
    /// disabled.
    pub(crate) fn publish_interval(&self) -> Option<Duration> {
        if self.publish_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.publish_hz)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.publish_hz, 10);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_backoff, Duration::from_secs(1));
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_publish_interval_default_is_100ms() {
        let config = SessionConfig::default();
        assert_eq!(config.publish_interval(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_publish_interval_zero_disables() {
        let config = SessionConfig {
            publish_hz: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.publish_interval(), None);
    }
}
