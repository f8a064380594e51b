use std::sync::Arc;

use crate::types::TypeDescriptor;

/// What to do when a text-format line violates its grammar.
///
/// Binary rows are never recoverable; this policy applies to the text
/// codecs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedRowPolicy {
    /// Surface the first malformed row as an error. The default.
    #[default]
    Fail,
    /// Skip malformed lines and continue with the next row.
    Skip,
}

/// How `JSONEachRow` values are typed, since the format carries no type
/// tags.
#[derive(Debug, Clone, Default)]
pub enum JsonDecodePolicy {
    /// Infer each value from its JSON literal shape (number, string, bool,
    /// null, array, object). The default.
    #[default]
    InferFromLiteral,
    /// Coerce named columns through caller-declared descriptors; columns
    /// absent from the schema fall back to literal-shape inference.
    DeclaredSchema(Vec<(String, Arc<TypeDescriptor>)>),
}
