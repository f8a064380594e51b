//! SQL command execution.
//!
//! A [`Command`] composes the final query text from the requested read
//! behavior (row-limit clauses) and the selected output format (trailing
//! `FORMAT` clause), hands it to the transport, and wraps the response
//! stream in the matching row reader. Each command owns one cancellation
//! token; cancelling aborts the in-flight transport call and fails any
//! pending read as cancelled, never as a data error.

use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{ClickHouseError, Result};
use crate::models::{JsonDecodePolicy, MalformedRowPolicy, OutputFormat, ReadBehavior};
use crate::reader::binary::BinaryRowReader;
use crate::reader::json::JsonRowReader;
use crate::reader::tsv::TsvRowReader;
use crate::reader::{LineStream, RowReader};
use crate::transport::{ChunkStream, Transport};
use crate::value::Value;

/// One executable SQL command.
///
/// Built via [`ClickHouseClient::command`](crate::ClickHouseClient::command).
/// Single logical operation per instance: execute once, read forward, or
/// cancel from another task through [`Command::cancellation_token`].
pub struct Command {
    transport: Arc<dyn Transport>,
    sql: String,
    format: OutputFormat,
    malformed_row_policy: MalformedRowPolicy,
    json_decode_policy: JsonDecodePolicy,
    cancel: CancellationToken,
}

impl Command {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        sql: String,
        format: OutputFormat,
        malformed_row_policy: MalformedRowPolicy,
        json_decode_policy: JsonDecodePolicy,
    ) -> Self {
        Self {
            transport,
            sql,
            format,
            malformed_row_policy,
            json_decode_policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the output format for this command.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the malformed-row policy for this command (text formats
    /// only).
    pub fn with_malformed_row_policy(mut self, policy: MalformedRowPolicy) -> Self {
        self.malformed_row_policy = policy;
        self
    }

    /// Override the JSON decode policy for this command.
    pub fn with_json_decode_policy(mut self, policy: JsonDecodePolicy) -> Self {
        self.json_decode_policy = policy;
        self
    }

    /// Request cancellation. The outstanding transport read aborts and any
    /// pending `advance()` completes with [`ClickHouseError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the in-flight request; lets another task cancel.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Final query text for `behavior`, without sending anything.
    fn build_query_text(&self, behavior: ReadBehavior) -> Result<String> {
        let mut text = self.sql.clone();
        match behavior {
            ReadBehavior::SingleRow | ReadBehavior::SingleResult => text.push_str("\nLIMIT 1"),
            ReadBehavior::SchemaOnly => {
                if self.format == OutputFormat::Json {
                    // Fails before any network call: the format has no
                    // schema header to return.
                    return Err(ClickHouseError::UnsupportedOperation(
                        "JSONEachRow cannot express a schema-only result".to_string(),
                    ));
                }
                text.push_str("\nLIMIT 0");
            }
            ReadBehavior::Default => {}
        }
        text.push_str("\nFORMAT ");
        text.push_str(self.format.format_name());
        Ok(text)
    }

    /// Execute the command and return a reader over the result set.
    pub async fn execute(&self, behavior: ReadBehavior) -> Result<RowReader> {
        let text = self.build_query_text(behavior)?;

        let sql_preview = if self.sql.len() > 80 {
            format!("{}...", &self.sql[..80])
        } else {
            self.sql.clone()
        };
        debug!(
            "[LINK_QUERY] Starting query: \"{}\" (format={}, behavior={behavior:?})",
            sql_preview.replace('\n', " "),
            self.format.format_name()
        );

        let stream = self.transport.send_query(&text, &self.cancel).await?;
        let chunks = ChunkStream::new(stream, self.cancel.clone());
        match self.format {
            OutputFormat::RowBinary => {
                let reader = BinaryRowReader::new(chunks).await?;
                Ok(RowReader::from_binary(reader))
            }
            OutputFormat::Tsv => {
                let reader =
                    TsvRowReader::new(LineStream::new(chunks), self.malformed_row_policy).await?;
                Ok(RowReader::from_tsv(reader))
            }
            OutputFormat::Json => {
                let reader = JsonRowReader::new(
                    LineStream::new(chunks),
                    self.malformed_row_policy,
                    self.json_decode_policy.clone(),
                )
                .await?;
                Ok(RowReader::from_json(reader))
            }
        }
    }

    /// Execute and return the single row's first field value.
    pub async fn execute_scalar(&self) -> Result<Value> {
        let mut reader = self.execute(ReadBehavior::SingleResult).await?;
        let row = reader.ensure_single_row().await?;
        row.into_iter().next().ok_or_else(|| {
            ClickHouseError::InvalidOperation("result set has no fields".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use async_trait::async_trait;

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send_query(&self, _sql: &str, _cancel: &CancellationToken) -> Result<ByteStream> {
            panic!("transport must not be called");
        }
    }

    fn command(sql: &str, format: OutputFormat) -> Command {
        Command::new(
            Arc::new(NeverTransport),
            sql.to_string(),
            format,
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::InferFromLiteral,
        )
    }

    #[test]
    fn test_query_text_mutation() {
        let cmd = command("SELECT 1", OutputFormat::RowBinary);
        assert_eq!(
            cmd.build_query_text(ReadBehavior::Default).unwrap(),
            "SELECT 1\nFORMAT RowBinaryWithNamesAndTypes"
        );
        assert_eq!(
            cmd.build_query_text(ReadBehavior::SingleRow).unwrap(),
            "SELECT 1\nLIMIT 1\nFORMAT RowBinaryWithNamesAndTypes"
        );
        assert_eq!(
            cmd.build_query_text(ReadBehavior::SchemaOnly).unwrap(),
            "SELECT 1\nLIMIT 0\nFORMAT RowBinaryWithNamesAndTypes"
        );

        let cmd = command("SELECT 1", OutputFormat::Tsv);
        assert_eq!(
            cmd.build_query_text(ReadBehavior::SingleResult).unwrap(),
            "SELECT 1\nLIMIT 1\nFORMAT TSVWithNamesAndTypes"
        );
    }

    #[tokio::test]
    async fn test_schema_only_rejected_for_json_before_transport() {
        let cmd = command("SELECT 1", OutputFormat::Json);
        // NeverTransport panics if reached; the failure must come first.
        let result = cmd.execute(ReadBehavior::SchemaOnly).await;
        assert!(matches!(
            result,
            Err(ClickHouseError::UnsupportedOperation(_))
        ));
    }
}
