//! `TSVWithNamesAndTypes` reader.
//!
//! Line 1 carries column names, line 2 the type strings; every further
//! `\n`-terminated line is one row of tab-separated, escaped literal tokens.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{ClickHouseError, Result};
use crate::models::{MalformedRowPolicy, ResultMetadata};
use crate::reader::{LineStream, Row};
use crate::types;
use crate::wire::literal::parse_literal;

pub(crate) struct TsvRowReader {
    lines: LineStream,
    metadata: ResultMetadata,
    policy: MalformedRowPolicy,
}

impl TsvRowReader {
    /// Create the reader, consuming the two header lines eagerly.
    pub(crate) async fn new(mut lines: LineStream, policy: MalformedRowPolicy) -> Result<Self> {
        let names_line = lines
            .next_line()
            .await?
            .ok_or(ClickHouseError::TruncatedStream)?;
        let types_line = lines
            .next_line()
            .await?
            .ok_or(ClickHouseError::TruncatedStream)?;

        let names: Vec<String> = names_line.split('\t').map(unescape).collect();
        let type_strings: Vec<String> = types_line.split('\t').map(unescape).collect();
        if names.len() != type_strings.len() {
            return Err(ClickHouseError::MalformedRow(format!(
                "header mismatch: {} names vs {} types",
                names.len(),
                type_strings.len()
            )));
        }
        let descriptors = type_strings
            .iter()
            .map(|s| types::resolve(s).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        debug!("[LINK_TSV] Header decoded: {} column(s)", names.len());
        Ok(Self {
            lines,
            metadata: ResultMetadata::new(names, descriptors),
            policy,
        })
    }

    pub(crate) fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub(crate) async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            match self.parse_row(&line) {
                Ok(row) => return Ok(Some(row)),
                Err(ClickHouseError::MalformedRow(message))
                    if self.policy == MalformedRowPolicy::Skip =>
                {
                    warn!("[LINK_TSV] Skipping malformed row: {message}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn parse_row(&self, line: &str) -> Result<Row> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != self.metadata.field_count() {
            return Err(ClickHouseError::MalformedRow(format!(
                "expected {} fields, line has {}",
                self.metadata.field_count(),
                fields.len()
            )));
        }
        let mut row = Vec::with_capacity(fields.len());
        for (raw, desc) in fields.iter().zip(self.metadata.field_types()) {
            row.push(parse_field(raw, desc)?);
        }
        Ok(row)
    }
}

fn parse_field(raw: &str, desc: &types::TypeDescriptor) -> Result<crate::value::Value> {
    // The raw (pre-unescape) two-character sequence \N is the null token.
    if raw == "\\N" {
        if desc.accepts_null() {
            return Ok(crate::value::Value::Null);
        }
        return Err(ClickHouseError::MalformedRow(format!(
            "null token for non-nullable {desc}"
        )));
    }
    parse_literal(desc, &unescape(raw))
}

/// Undo ClickHouse TSV escaping. Unknown escape sequences keep the escaped
/// character as-is.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
