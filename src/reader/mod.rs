//! Format-agnostic row reading.
//!
//! [`RowReader`] unifies the three codec readers behind one
//! current-row/advance/accessor contract. Reading is forward-only: a row is
//! materialized, consumed, and replaced by the next one.

pub(crate) mod binary;
pub(crate) mod json;
pub(crate) mod tsv;

use bytes::BytesMut;

use crate::error::{ClickHouseError, Result};
use crate::models::ResultMetadata;
use crate::transport::ChunkStream;
use crate::types::TypeDescriptor;
use crate::value::Value;

use binary::BinaryRowReader;
use json::JsonRowReader;
use tsv::TsvRowReader;

/// One decoded row: field values in declared column order.
pub type Row = Vec<Value>;

enum ReaderKind {
    Binary(BinaryRowReader),
    Tsv(TsvRowReader),
    Json(JsonRowReader),
}

impl ReaderKind {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        match self {
            ReaderKind::Binary(reader) => reader.next_row().await,
            ReaderKind::Tsv(reader) => reader.next_row().await,
            ReaderKind::Json(reader) => reader.next_row().await,
        }
    }

    fn metadata(&self) -> &ResultMetadata {
        match self {
            ReaderKind::Binary(reader) => reader.metadata(),
            ReaderKind::Tsv(reader) => reader.metadata(),
            ReaderKind::Json(reader) => reader.metadata(),
        }
    }
}

/// Forward-only reader over one result set.
///
/// Not `Sync`: one logical operation per instance; callers needing
/// concurrency use distinct commands.
pub struct RowReader {
    inner: ReaderKind,
    current: Option<Row>,
    peeked: Option<Row>,
    exhausted: bool,
}

impl std::fmt::Debug for RowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowReader")
            .field("current", &self.current)
            .field("peeked", &self.peeked)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl RowReader {
    pub(crate) fn from_binary(reader: BinaryRowReader) -> Self {
        Self::new(ReaderKind::Binary(reader))
    }

    pub(crate) fn from_tsv(reader: TsvRowReader) -> Self {
        Self::new(ReaderKind::Tsv(reader))
    }

    pub(crate) fn from_json(reader: JsonRowReader) -> Self {
        Self::new(ReaderKind::Json(reader))
    }

    fn new(inner: ReaderKind) -> Self {
        Self {
            inner,
            current: None,
            peeked: None,
            exhausted: false,
        }
    }

    async fn peek(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        if self.exhausted {
            return Ok(false);
        }
        match self.inner.next_row().await? {
            Some(row) => {
                self.peeked = Some(row);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// True while at least one more row can be read.
    pub async fn has_rows(&mut self) -> Result<bool> {
        self.peek().await
    }

    /// Move to the next row. Returns `false` at exhaustion, after which no
    /// further decode is attempted.
    pub async fn advance(&mut self) -> Result<bool> {
        if self.peek().await? {
            self.current = self.peeked.take();
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    /// Number of fields per row.
    pub fn field_count(&self) -> usize {
        self.inner.metadata().field_count()
    }

    /// Field names in declared order (duplicates preserved).
    pub fn field_names(&self) -> &[String] {
        self.inner.metadata().field_names()
    }

    /// Declared type of the field at `index`.
    pub fn field_type(&self, index: usize) -> Result<&TypeDescriptor> {
        self.inner
            .metadata()
            .field_type(index)
            .map(|arc| arc.as_ref())
            .ok_or_else(|| {
                ClickHouseError::InvalidOperation(format!(
                    "field index {index} out of range (count {})",
                    self.field_count()
                ))
            })
    }

    /// Value of the current row's field at `index`.
    pub fn value(&self, index: usize) -> Result<&Value> {
        let row = self.current.as_ref().ok_or_else(|| {
            ClickHouseError::InvalidOperation("no current row; call advance() first".to_string())
        })?;
        row.get(index).ok_or_else(|| {
            ClickHouseError::InvalidOperation(format!(
                "field index {index} out of range (count {})",
                row.len()
            ))
        })
    }

    /// The whole current row.
    pub fn row(&self) -> Result<&[Value]> {
        self.current.as_deref().ok_or_else(|| {
            ClickHouseError::InvalidOperation("no current row; call advance() first".to_string())
        })
    }

    /// Assert the result set has exactly `expected` fields.
    pub fn ensure_field_count(&self, expected: usize) -> Result<()> {
        let actual = self.field_count();
        if actual == expected {
            Ok(())
        } else {
            Err(ClickHouseError::InvalidOperation(format!(
                "expected {expected} fields, result set has {actual}"
            )))
        }
    }

    /// Read and return the one and only row, failing with
    /// [`ClickHouseError::UnexpectedRowCount`] when the result holds zero or
    /// more than one row.
    pub async fn ensure_single_row(&mut self) -> Result<Row> {
        if !self.advance().await? {
            return Err(ClickHouseError::UnexpectedRowCount { actual: 0 });
        }
        let row = self.current.take().expect("advance() produced a row");
        if self.peek().await? {
            return Err(ClickHouseError::UnexpectedRowCount { actual: 2 });
        }
        Ok(row)
    }
}

/// Splits a chunk stream into `\n`-terminated lines for the text codecs.
///
/// A non-empty trailing fragment without its terminator is a truncated
/// stream; the server always terminates rows.
pub(crate) struct LineStream {
    chunks: ChunkStream,
    buf: BytesMut,
    done: bool,
}

impl LineStream {
    pub(crate) fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            buf: BytesMut::new(),
            done: false,
        }
    }

    pub(crate) async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(Some(
                    String::from_utf8_lossy(&line[..line.len() - 1]).into_owned(),
                ));
            }
            if self.done {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ClickHouseError::TruncatedStream);
            }
            match self.chunks.next_chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio_util::sync::CancellationToken;

    fn lines_over(parts: Vec<&'static [u8]>) -> LineStream {
        let stream: ByteStream = futures_util::stream::iter(
            parts.into_iter().map(|p| Ok(Bytes::from_static(p))),
        )
        .boxed();
        LineStream::new(ChunkStream::new(stream, CancellationToken::new()))
    }

    #[tokio::test]
    async fn test_line_splitting_across_chunks() {
        let mut lines = lines_over(vec![b"ab", b"c\nde\nf", b"g\n"]);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("de"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("fg"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unterminated_line_is_truncation() {
        let mut lines = lines_over(vec![b"ab\ncd"]);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ab"));
        assert!(matches!(
            lines.next_line().await,
            Err(ClickHouseError::TruncatedStream)
        ));
    }
}
