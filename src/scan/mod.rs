/// Result Materialization Module
///
/// Turns rows read from a [`Cursor`](crate::core::db::Cursor) into
/// application values.
///
/// ## Architecture
///
/// - **Values** (`value.rs`): dynamic cell values and the materializer for map decoding
/// - **Records** (`record.rs`): static field descriptors and the `record!` macro
/// - **Binding** (`binder.rs`): column-to-slot resolution
/// - **Destinations** (`destination.rs`): classification of decode targets
/// - **Decoding** (`decoder.rs`): row, sequence and row-or-none decoding
pub mod binder;
pub mod decoder;
pub mod destination;
pub mod record;
pub mod value;

pub use binder::{bind_columns, normalize_name, Binding, BindingPlan};
pub use decoder::{decode, decode_one, decode_sequence, Decoder};
pub use destination::{classify, Decode, Destination, DestinationKind, Scalar, SequenceTarget};
pub use record::{Field, FieldKind, Record, RecordTarget};
pub use value::{materialize, CanonicalValue, Placeholder, RawBytes, RowMap, TypedCell, Value};
