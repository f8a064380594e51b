//! Timeout configuration for ClickHouse client operations.

use std::time::Duration;

/// Timeout configuration for HTTP query execution.
///
/// All values have sensible defaults; analytical queries can legitimately
/// stream for a long time, so the receive timeout bounds the whole response
/// read, not a single chunk.
///
/// # Examples
///
/// ```rust
/// use clickhouse_link::ClickHouseTimeouts;
/// use std::time::Duration;
///
/// let timeouts = ClickHouseTimeouts::default();
///
/// let timeouts = ClickHouseTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .receive_timeout(Duration::from_secs(600))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClickHouseTimeouts {
    /// Timeout for establishing connections (TCP + TLS handshake).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for the full response read after a request is sent.
    /// Set to zero to wait indefinitely.
    /// Default: 300 seconds
    pub receive_timeout: Duration,

    /// Timeout for sending the request body to the server.
    /// Default: 30 seconds
    pub send_timeout: Duration,
}

impl Default for ClickHouseTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(300),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl ClickHouseTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> ClickHouseTimeoutsBuilder {
        ClickHouseTimeoutsBuilder::new()
    }

    /// Timeouts suitable for localhost development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            receive_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(5),
        }
    }

    /// Timeouts suitable for high-latency links or heavy queries.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            receive_timeout: Duration::from_secs(3600),
            send_timeout: Duration::from_secs(60),
        }
    }

    /// Check if a duration represents "no timeout".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero()
    }
}

/// Builder for [`ClickHouseTimeouts`].
#[derive(Debug, Clone)]
pub struct ClickHouseTimeoutsBuilder {
    timeouts: ClickHouseTimeouts,
}

impl ClickHouseTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: ClickHouseTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + TLS handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the full response read timeout. Zero disables it.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.receive_timeout = timeout;
        self
    }

    /// Set the request send timeout.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.send_timeout = timeout;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> ClickHouseTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = ClickHouseTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.receive_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_builder() {
        let timeouts = ClickHouseTimeouts::builder()
            .connection_timeout(Duration::from_secs(60))
            .receive_timeout(Duration::ZERO)
            .build();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert!(ClickHouseTimeouts::is_no_timeout(timeouts.receive_timeout));
    }
}
