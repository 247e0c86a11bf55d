/// Core Module for sqlbind
///
/// Shared infrastructure: the error type and the database execution layer
/// (cursors, pooled connections, query handles and transactions).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, Result, SqlbindError};
