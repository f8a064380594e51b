//! Query transport: the collaborator that turns final query text into a
//! response byte stream.
//!
//! The executor only depends on the [`Transport`] trait, so tests can
//! substitute a canned-bytes transport. The production implementation is
//! [`HttpTransport`], which POSTs the query text to the server's HTTP
//! interface and streams the response body.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::credentials::Credentials;
use crate::error::{ClickHouseError, Result};
use crate::timeouts::ClickHouseTimeouts;

/// Response body as a stream of byte chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Sends final query text and yields the raw response stream.
///
/// Transport errors pass through the executor verbatim; the driver never
/// reinterprets them as data-format failures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `sql` and return the response body. Must abandon the request
    /// promptly when `cancel` fires.
    async fn send_query(&self, sql: &str, cancel: &CancellationToken) -> Result<ByteStream>;
}

/// HTTP transport over the ClickHouse HTTP interface.
///
/// The query text is the POST body; user, password and database travel as
/// URL query parameters.
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    database: String,
    receive_timeout: Duration,
}

const MAX_RETRIES: u32 = 3;

impl HttpTransport {
    pub fn new(
        base_url: String,
        credentials: Credentials,
        database: String,
        timeouts: &ClickHouseTimeouts,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeouts.connection_timeout)
            .build()
            .map_err(|e| ClickHouseError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url,
            credentials,
            database,
            receive_timeout: timeouts.receive_timeout,
        })
    }

    fn is_retriable(e: &ClickHouseError) -> bool {
        matches!(e, ClickHouseError::Network(_) | ClickHouseError::Timeout(_))
    }

    async fn send_once(&self, sql: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        let mut request = self
            .http_client
            .post(&self.base_url)
            .query(&[
                ("user", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("database", self.database.as_str()),
            ])
            .body(sql.to_owned());
        if !ClickHouseTimeouts::is_no_timeout(self.receive_timeout) {
            request = request.timeout(self.receive_timeout);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClickHouseError::Cancelled),
            result = request.send() => result?,
        };

        let status = response.status();
        debug!("[LINK_HTTP] Response received: status={status}");
        if status.is_success() {
            Ok(response.bytes_stream().map_err(ClickHouseError::from).boxed())
        } else {
            // The server puts its exception text in the body.
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClickHouseError::Cancelled),
                body = response.text() => body.unwrap_or_else(|_| "Unknown error".to_string()),
            };
            Err(ClickHouseError::Server {
                status_code: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_query(&self, sql: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        let mut retries = 0;
        loop {
            debug!(
                "[LINK_HTTP] Sending POST to {} (attempt {}/{})",
                self.base_url,
                retries + 1,
                MAX_RETRIES + 1
            );
            match self.send_once(sql, cancel).await {
                Ok(stream) => return Ok(stream),
                Err(e) if retries < MAX_RETRIES && Self::is_retriable(&e) => {
                    warn!(
                        "[LINK_HTTP] Retriable error (attempt {}/{}): {e}",
                        retries + 1,
                        MAX_RETRIES + 1
                    );
                    retries += 1;
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(retries))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pulls chunks from a [`ByteStream`], racing every pull against the
/// command's cancellation token. This is the codecs' only suspension point,
/// so it is the only place cancellation is observed.
pub(crate) struct ChunkStream {
    stream: ByteStream,
    cancel: CancellationToken,
}

impl ChunkStream {
    pub(crate) fn new(stream: ByteStream, cancel: CancellationToken) -> Self {
        Self { stream, cancel }
    }

    /// Next body chunk, `None` at end of stream, `Cancelled` if the token
    /// fires first.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClickHouseError::Cancelled),
            chunk = self.stream.next() => match chunk {
                Some(Ok(bytes)) => Ok(Some(bytes)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            },
        }
    }
}
