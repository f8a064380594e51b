//! Data models shared by the command executor and the row readers.

pub mod output_format;
pub mod policies;
pub mod read_behavior;
pub mod result_metadata;

pub use output_format::OutputFormat;
pub use policies::{JsonDecodePolicy, MalformedRowPolicy};
pub use read_behavior::ReadBehavior;
pub use result_metadata::ResultMetadata;
