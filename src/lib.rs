//! sqlbind decodes SQL query results into application values.
//!
//! A destination is one of four kinds: a scalar, a dynamic row map, a record
//! registered with [`record!`], or a `Vec` of those. Rows are read from a
//! [`Cursor`] and bound to the destination by column name.
//!
//! ```
//! use sqlbind::{decode, MemoryCursor, SqlValue};
//!
//! sqlbind::record! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         #[column = "uid"]
//!         pub id: i64,
//!         pub name: String,
//!     }
//! }
//!
//! let cursor = MemoryCursor::new(["uid", "name"])
//!     .with_row(vec![SqlValue::Integer(1), SqlValue::Text("alice".into())]);
//! let mut users: Vec<User> = Vec::new();
//! decode(cursor, &mut users).unwrap();
//! assert_eq!(users[0].name, "alice");
//! ```

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod dialect;
pub mod scan;

pub use rusqlite::types::Value as SqlValue;

pub use crate::core::db::{
    scan_values, Client, Cursor, MemoryCursor, NativeType, Pool, PoolLimits, PooledConnection,
    Query, ScanTarget, Sink, SqliteCursor, TransactionState, Tx,
};
pub use crate::core::{ErrorKind, Result, SqlbindError};
pub use config::{ClientOptions, DialectConfig, OptionValue, PoolOptions};
pub use dialect::{Databases, Dialect};
pub use scan::{
    classify, decode, decode_one, decode_sequence, Decode, Decoder, Destination, DestinationKind,
    Field, FieldKind, RawBytes, Record, RecordTarget, RowMap, Scalar, SequenceTarget, Value,
};
