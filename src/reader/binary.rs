//! `RowBinaryWithNamesAndTypes` reader.
//!
//! Header: varint column count, then that many varint-prefixed name strings,
//! then that many type strings resolved through the grammar. Each row then
//! decodes one value per column in declared order.
//!
//! The reader buffers transport chunks and attempts a decode against the
//! buffered bytes; when the bytes run out mid-value and the transport still
//! has chunks, the decode is retried from the row start once more data
//! arrives. Truncation therefore only surfaces when the stream is really
//! done; end of stream at a row boundary is plain exhaustion.

use std::sync::Arc;

use bytes::BytesMut;
use log::debug;

use crate::error::{ClickHouseError, Result};
use crate::models::ResultMetadata;
use crate::reader::Row;
use crate::transport::ChunkStream;
use crate::types;
use crate::wire::binary::decode_value;
use crate::wire::ByteCursor;

pub(crate) struct BinaryRowReader {
    chunks: ChunkStream,
    buf: BytesMut,
    stream_done: bool,
    metadata: ResultMetadata,
}

impl BinaryRowReader {
    /// Create the reader, consuming the header eagerly.
    pub(crate) async fn new(chunks: ChunkStream) -> Result<Self> {
        let mut reader = Self {
            chunks,
            buf: BytesMut::new(),
            stream_done: false,
            metadata: ResultMetadata::new(Vec::new(), Vec::new()),
        };
        reader.metadata = reader.read_header().await?;
        debug!(
            "[LINK_BINARY] Header decoded: {} column(s)",
            reader.metadata.field_count()
        );
        Ok(reader)
    }

    pub(crate) fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    async fn pull_chunk(&mut self) -> Result<()> {
        match self.chunks.next_chunk().await? {
            Some(chunk) => self.buf.extend_from_slice(&chunk),
            None => self.stream_done = true,
        }
        Ok(())
    }

    async fn read_header(&mut self) -> Result<ResultMetadata> {
        loop {
            match try_parse_header(&self.buf) {
                Ok((metadata, consumed)) => {
                    let _ = self.buf.split_to(consumed);
                    return Ok(metadata);
                }
                Err(ClickHouseError::TruncatedStream) if !self.stream_done => {
                    self.pull_chunk().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode the next row, or `None` when the stream is cleanly exhausted.
    pub(crate) async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.buf.is_empty() && self.stream_done {
                return Ok(None);
            }
            if !self.buf.is_empty() {
                let mut cur = ByteCursor::new(&self.buf);
                match decode_row(&self.metadata, &mut cur) {
                    Ok(row) => {
                        let consumed = cur.position();
                        let _ = self.buf.split_to(consumed);
                        return Ok(Some(row));
                    }
                    Err(ClickHouseError::TruncatedStream) => {
                        if self.stream_done {
                            // Bytes ran out mid-row with nothing left to pull.
                            return Err(ClickHouseError::TruncatedStream);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            self.pull_chunk().await?;
        }
    }
}

fn try_parse_header(buf: &[u8]) -> Result<(ResultMetadata, usize)> {
    let mut cur = ByteCursor::new(buf);
    let count = cur.read_var_u64()?;
    let count = usize::try_from(count)
        .map_err(|_| ClickHouseError::MalformedRow("column count overflow".to_string()))?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(cur.read_string()?);
    }
    let mut descriptors = Vec::with_capacity(count);
    for _ in 0..count {
        let type_str = cur.read_string()?;
        descriptors.push(Arc::new(types::resolve(&type_str)?));
    }
    Ok((ResultMetadata::new(names, descriptors), cur.position()))
}

fn decode_row(metadata: &ResultMetadata, cur: &mut ByteCursor<'_>) -> Result<Row> {
    let mut row = Vec::with_capacity(metadata.field_count());
    for desc in metadata.field_types() {
        row.push(decode_value(desc, cur)?);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ByteStream;
    use crate::value::Value;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio_util::sync::CancellationToken;

    fn chunks_of(parts: Vec<Vec<u8>>) -> ChunkStream {
        let stream: ByteStream =
            futures_util::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p)))).boxed();
        ChunkStream::new(stream, CancellationToken::new())
    }

    fn put_string(buf: &mut Vec<u8>, s: &str) {
        buf.push(u8::try_from(s.len()).unwrap());
        buf.extend_from_slice(s.as_bytes());
    }

    /// Header for columns `a UInt8`, `b Nullable(String)`.
    fn two_column_header() -> Vec<u8> {
        let mut buf = vec![2_u8];
        put_string(&mut buf, "a");
        put_string(&mut buf, "b");
        put_string(&mut buf, "UInt8");
        put_string(&mut buf, "Nullable(String)");
        buf
    }

    #[tokio::test]
    async fn test_header_and_rows() {
        let mut payload = two_column_header();
        payload.push(7);
        payload.push(0);
        put_string(&mut payload, "hi");
        payload.push(9);
        payload.push(1);

        let mut reader = BinaryRowReader::new(chunks_of(vec![payload])).await.unwrap();
        assert_eq!(reader.metadata().field_names(), ["a", "b"]);

        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(
            row,
            vec![Value::UInt8(7), Value::String("hi".to_string())]
        );
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row, vec![Value::UInt8(9), Value::Null]);
        assert_eq!(reader.next_row().await.unwrap(), None);
        // Exhaustion is stable.
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rows_split_across_chunks() {
        let mut payload = two_column_header();
        payload.push(1);
        payload.push(0);
        put_string(&mut payload, "chunked");

        // Slice the payload into 3-byte chunks.
        let parts: Vec<Vec<u8>> = payload.chunks(3).map(<[u8]>::to_vec).collect();
        let mut reader = BinaryRowReader::new(chunks_of(parts)).await.unwrap();
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(
            row,
            vec![Value::UInt8(1), Value::String("chunked".to_string())]
        );
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_mid_row() {
        let mut payload = two_column_header();
        payload.push(7);
        payload.push(0);
        payload.push(200); // declares a 200-byte string that never arrives

        let mut reader = BinaryRowReader::new(chunks_of(vec![payload])).await.unwrap();
        assert!(matches!(
            reader.next_row().await,
            Err(ClickHouseError::TruncatedStream)
        ));
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let payload = two_column_header();
        let mut reader = BinaryRowReader::new(chunks_of(vec![payload])).await.unwrap();
        assert_eq!(reader.metadata().field_count(), 2);
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_header_type() {
        let mut buf = vec![1_u8];
        put_string(&mut buf, "a");
        put_string(&mut buf, "NotAType");
        let result = BinaryRowReader::new(chunks_of(vec![buf])).await;
        assert!(matches!(result, Err(ClickHouseError::UnknownType(_))));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let buf = vec![2_u8, 1, b'a'];
        let result = BinaryRowReader::new(chunks_of(vec![buf])).await;
        assert!(matches!(result, Err(ClickHouseError::TruncatedStream)));
    }
}
