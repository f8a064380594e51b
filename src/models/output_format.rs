use serde::{Deserialize, Serialize};

/// Server output format requested via the query's trailing `FORMAT` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// `RowBinaryWithNamesAndTypes`: compact binary with an embedded
    /// name/type header. The default.
    #[default]
    RowBinary,
    /// `TSVWithNamesAndTypes`: tab-separated text with name and type header
    /// lines.
    Tsv,
    /// `JSONEachRow`: one self-describing JSON object per line, no type
    /// header.
    Json,
}

impl OutputFormat {
    /// Token appended after `FORMAT` in the outgoing query text.
    pub fn format_name(&self) -> &'static str {
        match self {
            OutputFormat::RowBinary => "RowBinaryWithNamesAndTypes",
            OutputFormat::Tsv => "TSVWithNamesAndTypes",
            OutputFormat::Json => "JSONEachRow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(
            OutputFormat::RowBinary.format_name(),
            "RowBinaryWithNamesAndTypes"
        );
        assert_eq!(OutputFormat::Tsv.format_name(), "TSVWithNamesAndTypes");
        assert_eq!(OutputFormat::Json.format_name(), "JSONEachRow");
        assert_eq!(OutputFormat::default(), OutputFormat::RowBinary);
    }
}
