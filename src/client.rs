//! Main ClickHouse client with builder pattern.
//!
//! Provides the primary interface for connecting to a ClickHouse server's
//! HTTP interface and executing SQL commands.

use std::sync::Arc;

use log::debug;

use crate::command::Command;
use crate::credentials::Credentials;
use crate::error::{ClickHouseError, Result};
use crate::models::{JsonDecodePolicy, MalformedRowPolicy, OutputFormat, ReadBehavior};
use crate::reader::RowReader;
use crate::timeouts::ClickHouseTimeouts;
use crate::transport::{HttpTransport, Transport};
use crate::value::Value;

/// Main ClickHouse client.
///
/// Use [`ClickHouseClientBuilder`] to construct instances with custom
/// configuration. The client is cheap to clone; clones share the underlying
/// HTTP connection pool.
///
/// # Examples
///
/// ```rust,no_run
/// use clickhouse_link::ClickHouseClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClickHouseClient::builder()
///     .base_url("http://localhost:8123")
///     .database("default")
///     .build()?;
///
/// let mut reader = client.query("SELECT number FROM system.numbers LIMIT 10").await?;
/// while reader.advance().await? {
///     println!("{}", reader.value(0)?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClickHouseClient {
    transport: Arc<dyn Transport>,
    format: OutputFormat,
    malformed_row_policy: MalformedRowPolicy,
    json_decode_policy: JsonDecodePolicy,
}

impl ClickHouseClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> ClickHouseClientBuilder {
        ClickHouseClientBuilder::new()
    }

    /// Create a command for `sql` using the client's configured defaults.
    ///
    /// The command owns its cancellation token; use this form when the
    /// caller may need to cancel or to override per-command policies.
    pub fn command(&self, sql: impl Into<String>) -> Command {
        Command::new(
            Arc::clone(&self.transport),
            sql.into(),
            self.format,
            self.malformed_row_policy,
            self.json_decode_policy.clone(),
        )
    }

    /// Execute `sql` with default read behavior and return a row reader.
    pub async fn query(&self, sql: impl Into<String>) -> Result<RowReader> {
        self.command(sql).execute(ReadBehavior::Default).await
    }

    /// Execute `sql` and return the single row's first field value.
    pub async fn execute_scalar(&self, sql: impl Into<String>) -> Result<Value> {
        self.command(sql).execute_scalar().await
    }

    /// Probe the server with a trivial scalar query.
    pub async fn ping(&self) -> Result<()> {
        let value = self.execute_scalar("SELECT 1").await?;
        debug!("[LINK_PING] Server answered: {value}");
        Ok(())
    }
}

/// Builder for [`ClickHouseClient`].
pub struct ClickHouseClientBuilder {
    base_url: Option<String>,
    credentials: Credentials,
    database: String,
    format: OutputFormat,
    timeouts: ClickHouseTimeouts,
    malformed_row_policy: MalformedRowPolicy,
    json_decode_policy: JsonDecodePolicy,
    transport: Option<Arc<dyn Transport>>,
}

impl ClickHouseClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            credentials: Credentials::default(),
            database: "default".to_string(),
            format: OutputFormat::default(),
            timeouts: ClickHouseTimeouts::default(),
            malformed_row_policy: MalformedRowPolicy::default(),
            json_decode_policy: JsonDecodePolicy::default(),
            transport: None,
        }
    }

    /// Set the server base URL, e.g. `http://localhost:8123`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set authentication credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the default database for unqualified table names.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the default output format for commands.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set timeout configuration.
    pub fn timeouts(mut self, timeouts: ClickHouseTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the default malformed-row policy for text formats.
    pub fn malformed_row_policy(mut self, policy: MalformedRowPolicy) -> Self {
        self.malformed_row_policy = policy;
        self
    }

    /// Set the default JSON decode policy.
    pub fn json_decode_policy(mut self, policy: JsonDecodePolicy) -> Self {
        self.json_decode_policy = policy;
        self
    }

    /// Substitute a custom transport. Primarily for tests; when set, the
    /// base URL and credentials are unused.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ClickHouseClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self.base_url.ok_or_else(|| {
                    ClickHouseError::Configuration("base_url is required".to_string())
                })?;
                Arc::new(HttpTransport::new(
                    base_url,
                    self.credentials,
                    self.database,
                    &self.timeouts,
                )?)
            }
        };
        Ok(ClickHouseClient {
            transport,
            format: self.format,
            malformed_row_policy: self.malformed_row_policy,
            json_decode_policy: self.json_decode_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClickHouseClient::builder().build();
        assert!(matches!(result, Err(ClickHouseError::Configuration(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let client = ClickHouseClient::builder()
            .base_url("http://localhost:8123")
            .build()
            .unwrap();
        assert_eq!(client.format, OutputFormat::RowBinary);
        assert_eq!(client.malformed_row_policy, MalformedRowPolicy::Fail);
    }
}
