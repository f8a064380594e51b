//! Shared helpers for integration tests: a canned-bytes transport and
//! RowBinary payload builders.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use clickhouse_link::{
    ByteStream, ClickHouseClient, ClickHouseError, OutputFormat, Result, Transport,
};

/// How the mock transport answers a query.
pub enum MockBehavior {
    /// Stream the given chunks, then end.
    Chunks(Vec<Bytes>),
    /// Never produce a byte (long-running query).
    Pending,
    /// Answer with a server-side error.
    ServerError(u16, String),
}

/// Transport double that records query text and replays canned bytes.
pub struct MockTransport {
    behavior: MockBehavior,
    captured: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self::new(MockBehavior::Chunks(vec![Bytes::from(payload)]))
    }

    /// Query texts seen so far, in order.
    pub fn captured_sql(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_query(&self, sql: &str, cancel: &CancellationToken) -> Result<ByteStream> {
        self.captured.lock().unwrap().push(sql.to_string());
        match &self.behavior {
            MockBehavior::Chunks(chunks) => Ok(futures_util::stream::iter(
                chunks.clone().into_iter().map(Ok),
            )
            .boxed()),
            MockBehavior::Pending => {
                let _ = cancel;
                Ok(futures_util::stream::pending().boxed())
            }
            MockBehavior::ServerError(status_code, message) => Err(ClickHouseError::Server {
                status_code: *status_code,
                message: message.clone(),
            }),
        }
    }
}

/// Client wired to the given transport and format.
pub fn client_over(transport: Arc<MockTransport>, format: OutputFormat) -> ClickHouseClient {
    ClickHouseClient::builder()
        .transport(transport)
        .format(format)
        .build()
        .expect("mock client builds")
}

/// Append a varint-prefixed string (RowBinary string rule).
pub fn rb_string(buf: &mut Vec<u8>, s: &str) {
    assert!(s.len() < 128, "test strings stay single-byte varints");
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
}

/// `RowBinaryWithNamesAndTypes` header for the given (name, type) columns.
pub fn rb_header(columns: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = vec![columns.len() as u8];
    for (name, _) in columns {
        rb_string(&mut buf, name);
    }
    for (_, type_str) in columns {
        rb_string(&mut buf, type_str);
    }
    buf
}
