/// Database Module
///
/// The execution layer that feeds the decoding engine.
///
/// ## Architecture
///
/// - **Cursors** (`cursor.rs`): the `Cursor` trait, the row-scan primitive and its implementations
/// - **Connection Management** (`connection.rs`): the SQLite connection pool and per-client handles
/// - **Query Execution** (`query.rs`): deferred query handles and SQL formatting for logs
/// - **Transactions** (`transaction.rs`): `Tx` over a pooled connection
///
/// ## Error Handling
///
/// All database operations use the standardized `SqlbindError` type for consistent error propagation.
pub mod connection;
pub mod cursor;
pub mod query;
pub mod transaction;

pub use connection::*;
pub use cursor::*;
pub use query::*;
pub use transaction::*;
