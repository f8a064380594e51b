/// Caller-requested shape of a result set.
///
/// A behavior mutates the outgoing query text (row-limit clauses), never the
/// wire format itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadBehavior {
    /// No text mutation.
    #[default]
    Default,
    /// At most one row is wanted; appends `LIMIT 1`.
    SingleRow,
    /// A single result is wanted; appends `LIMIT 1`.
    SingleResult,
    /// Only the schema is wanted; appends `LIMIT 0`. Unsupported for the
    /// `JSONEachRow` format, which carries no schema header.
    SchemaOnly,
}
