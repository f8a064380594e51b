//! `JSONEachRow` reader.
//!
//! Each line is a self-describing JSON object. The format carries no type
//! tags, so the column set and presentation order come from the first row,
//! and value typing follows the configured [`JsonDecodePolicy`].

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value as Json;

use crate::error::{ClickHouseError, Result};
use crate::models::{JsonDecodePolicy, MalformedRowPolicy, ResultMetadata};
use crate::reader::{LineStream, Row};
use crate::types::TypeDescriptor;
use crate::value::Value;
use crate::wire::literal::decode_json;

pub(crate) struct JsonRowReader {
    lines: LineStream,
    metadata: ResultMetadata,
    policy: MalformedRowPolicy,
    decode: JsonDecodePolicy,
    /// First row, decoded during construction to establish the columns.
    buffered: Option<Row>,
}

impl JsonRowReader {
    /// Create the reader. The first row is decoded eagerly: it defines the
    /// column set and order; an empty stream yields empty metadata.
    pub(crate) async fn new(
        mut lines: LineStream,
        policy: MalformedRowPolicy,
        decode: JsonDecodePolicy,
    ) -> Result<Self> {
        let first = loop {
            match lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => break other,
            }
        };
        let (metadata, buffered) = match first {
            None => (ResultMetadata::new(Vec::new(), Vec::new()), None),
            Some(line) => {
                let object = parse_object(&line)?;
                let names: Vec<String> = object.keys().cloned().collect();
                let descriptors = names
                    .iter()
                    .map(|name| declared_type(&decode, name))
                    .collect();
                let metadata = ResultMetadata::new(names, descriptors);
                let row = decode_row(&metadata, &decode, &object)?;
                (metadata, Some(row))
            }
        };
        debug!(
            "[LINK_JSON] First row decoded: {} column(s)",
            metadata.field_count()
        );
        Ok(Self {
            lines,
            metadata,
            policy,
            decode,
            buffered,
        })
    }

    pub(crate) fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub(crate) async fn next_row(&mut self) -> Result<Option<Row>> {
        if let Some(row) = self.buffered.take() {
            return Ok(Some(row));
        }
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.trim().is_empty() {
                continue;
            }
            let parsed = parse_object(&line)
                .and_then(|object| decode_row(&self.metadata, &self.decode, &object));
            match parsed {
                Ok(row) => return Ok(Some(row)),
                Err(ClickHouseError::MalformedRow(message))
                    if self.policy == MalformedRowPolicy::Skip =>
                {
                    warn!("[LINK_JSON] Skipping malformed row: {message}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn parse_object(line: &str) -> Result<serde_json::Map<String, Json>> {
    match serde_json::from_str::<Json>(line) {
        Ok(Json::Object(object)) => Ok(object),
        Ok(other) => Err(ClickHouseError::MalformedRow(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(ClickHouseError::MalformedRow(format!("bad JSON: {e}"))),
    }
}

/// Descriptor reported for a column: the caller-declared one if the policy
/// names it, `String` otherwise (the format itself is untyped).
fn declared_type(decode: &JsonDecodePolicy, name: &str) -> Arc<TypeDescriptor> {
    if let JsonDecodePolicy::DeclaredSchema(schema) = decode {
        if let Some((_, desc)) = schema.iter().find(|(n, _)| n == name) {
            return Arc::clone(desc);
        }
    }
    Arc::new(TypeDescriptor::String)
}

fn decode_row(
    metadata: &ResultMetadata,
    decode: &JsonDecodePolicy,
    object: &serde_json::Map<String, Json>,
) -> Result<Row> {
    let null = Json::Null;
    let mut row = Vec::with_capacity(metadata.field_count());
    for (index, name) in metadata.field_names().iter().enumerate() {
        let json = object.get(name).unwrap_or(&null);
        let value = match decode {
            JsonDecodePolicy::DeclaredSchema(schema)
                if schema.iter().any(|(n, _)| n == name) =>
            {
                let desc = metadata
                    .field_type(index)
                    .expect("metadata covers every named field");
                decode_json(desc, json)?
            }
            _ => infer(json),
        };
        row.push(value);
    }
    Ok(row)
}

/// Literal-shape inference: the fallback typing when no schema is declared.
fn infer(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::Int64(v)
            } else if let Some(v) = n.as_u64() {
                Value::UInt64(v)
            } else {
                Value::Float64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(infer).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), infer(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ByteStream, ChunkStream};
    use crate::types::resolve;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio_util::sync::CancellationToken;

    fn lines_over(text: &'static str) -> LineStream {
        let stream: ByteStream =
            futures_util::stream::iter(vec![Ok(Bytes::from_static(text.as_bytes()))]).boxed();
        LineStream::new(ChunkStream::new(stream, CancellationToken::new()))
    }

    #[tokio::test]
    async fn test_infer_from_literal_shape() {
        let text = "{\"n\":1,\"s\":\"a\",\"f\":1.5,\"z\":null}\n{\"n\":2,\"s\":\"b\",\"f\":2.5,\"z\":3}\n";
        let mut reader = JsonRowReader::new(
            lines_over(text),
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::InferFromLiteral,
        )
        .await
        .unwrap();
        assert_eq!(reader.metadata().field_names(), ["n", "s", "f", "z"]);
        // Untyped format: every column reports String.
        assert_eq!(
            **reader.metadata().field_type(0).unwrap(),
            TypeDescriptor::String
        );

        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(
            row,
            vec![
                Value::Int64(1),
                Value::String("a".to_string()),
                Value::Float64(1.5),
                Value::Null,
            ]
        );
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row[3], Value::Int64(3));
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_declared_schema_coercion() {
        let schema = vec![
            ("id".to_string(), Arc::new(resolve("UInt64").unwrap())),
            (
                "tags".to_string(),
                Arc::new(resolve("Array(Nullable(Int32))").unwrap()),
            ),
        ];
        let text = "{\"id\":\"55\",\"tags\":[1,null]}\n";
        let mut reader = JsonRowReader::new(
            lines_over(text),
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::DeclaredSchema(schema),
        )
        .await
        .unwrap();
        assert_eq!(
            **reader.metadata().field_type(0).unwrap(),
            TypeDescriptor::UInt64
        );
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(
            row,
            vec![
                Value::UInt64(55),
                Value::Array(vec![Value::Int32(1), Value::Null]),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut reader = JsonRowReader::new(
            lines_over(""),
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::InferFromLiteral,
        )
        .await
        .unwrap();
        assert_eq!(reader.metadata().field_count(), 0);
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_line_policies() {
        let text = "{\"a\":1}\nnot json\n{\"a\":2}\n";
        let mut reader = JsonRowReader::new(
            lines_over(text),
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::InferFromLiteral,
        )
        .await
        .unwrap();
        assert!(reader.next_row().await.unwrap().is_some());
        assert!(matches!(
            reader.next_row().await,
            Err(ClickHouseError::MalformedRow(_))
        ));

        let mut reader = JsonRowReader::new(
            lines_over(text),
            MalformedRowPolicy::Skip,
            JsonDecodePolicy::InferFromLiteral,
        )
        .await
        .unwrap();
        assert_eq!(
            reader.next_row().await.unwrap().unwrap(),
            vec![Value::Int64(1)]
        );
        assert_eq!(
            reader.next_row().await.unwrap().unwrap(),
            vec![Value::Int64(2)]
        );
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key_is_null() {
        let text = "{\"a\":1,\"b\":2}\n{\"a\":3}\n";
        let mut reader = JsonRowReader::new(
            lines_over(text),
            MalformedRowPolicy::Fail,
            JsonDecodePolicy::InferFromLiteral,
        )
        .await
        .unwrap();
        reader.next_row().await.unwrap();
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Int64(3), Value::Null]);
    }
}
