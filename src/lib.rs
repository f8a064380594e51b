//! # clickhouse-link
//!
//! Async client driver for ClickHouse over its HTTP interface.
//!
//! The driver sends SQL text and decodes the server's own typed wire
//! formats back into native values:
//!
//! - **Type grammar** ([`types`]): parses the server's textual type grammar,
//!   arbitrarily nested (`Array(Tuple(Nullable(Int32), String))`), into an
//!   immutable descriptor tree shared across a result set.
//! - **Row codecs** ([`reader`]): `RowBinaryWithNamesAndTypes` (compact
//!   binary with embedded schema), `TSVWithNamesAndTypes` and `JSONEachRow`,
//!   unified behind one forward-only [`RowReader`] contract.
//! - **Command executor** ([`command`]): mutates outgoing query text per the
//!   requested [`ReadBehavior`], appends the `FORMAT` clause, and supports
//!   cooperative cancellation of in-flight reads.
//!
//! ## Example
//!
//! ```rust,no_run
//! use clickhouse_link::{ClickHouseClient, Credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClickHouseClient::builder()
//!     .base_url("http://localhost:8123")
//!     .credentials(Credentials::new("default", ""))
//!     .build()?;
//!
//! let value = client.execute_scalar("SELECT 1").await?;
//! assert_eq!(value.as_i64(), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod credentials;
pub mod error;
pub mod models;
pub mod reader;
pub mod timeouts;
pub mod transport;
pub mod types;
pub mod value;

mod wire;

// Re-export commonly used types at crate root
pub use client::{ClickHouseClient, ClickHouseClientBuilder};
pub use command::Command;
pub use credentials::Credentials;
pub use error::{ClickHouseError, Result};
pub use models::{
    JsonDecodePolicy, MalformedRowPolicy, OutputFormat, ReadBehavior, ResultMetadata,
};
pub use reader::{Row, RowReader};
pub use timeouts::{ClickHouseTimeouts, ClickHouseTimeoutsBuilder};
pub use transport::{ByteStream, HttpTransport, Transport};
pub use types::{resolve, TypeDescriptor};
pub use value::{Date, DateTime, DateTime64, Decimal, Int256, UInt256, Value};
