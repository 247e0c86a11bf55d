//! Row decoding.
//!
//! [`Decoder`] drives a [`Cursor`] into a classified [`Destination`]:
//! - `decode` fills a sequence from every row, or any other destination from the first row
//! - `decode_one` requires a row and reports [`SqlbindError::NoRows`] otherwise
//! - `decode_sequence` accepts sequence destinations only
//!
//! Each entry point takes the cursor by value and closes it exactly once
//! before returning, whatever the outcome.

use crate::core::db::{Cursor, ScanTarget, Sink};
use crate::core::{Result, SqlbindError};
use crate::scan::binder::{bind_columns, Binding, BindingPlan};
use crate::scan::destination::{Decode, Destination, SequenceTarget};
use crate::scan::record::RecordTarget;
use crate::scan::value::{materialize, Placeholder, RowMap};
use tracing::{debug, warn};

/// Owns a cursor for the length of one decode call and closes it once.
struct CursorGuard<C: Cursor> {
    cursor: C,
    closed: bool,
}

impl<C: Cursor> CursorGuard<C> {
    fn new(cursor: C) -> Self {
        CursorGuard { cursor, closed: false }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor.close()
    }

    /// Closes the cursor and combines the outcome; a decode error wins over a close error.
    fn finish(mut self, outcome: Result<()>) -> Result<()> {
        let closed = self.close();
        outcome.and(closed)
    }
}

impl<C: Cursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close cursor: {}", e);
        }
    }
}

/// Decoding options and entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    strict: bool,
}

impl Decoder {
    /// A permissive decoder: unmatched columns are discarded.
    pub fn new() -> Self {
        Decoder::default()
    }

    /// A decoder that fails with [`SqlbindError::UnboundColumn`] when a
    /// column has no destination field.
    pub fn strict() -> Self {
        Decoder { strict: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Decodes a whole result.
    ///
    /// Sequences receive every row in order. Any other destination receives
    /// the first row, if there is one; an empty result leaves it untouched
    /// and is not an error.
    pub fn decode<C: Cursor, D: Decode + ?Sized>(&self, cursor: C, dest: &mut D) -> Result<()> {
        let mut guard = CursorGuard::new(cursor);
        let outcome = match dest.destination() {
            Destination::Sequence(seq) => self.fill_sequence(&mut guard.cursor, seq),
            single => self.fill_first(&mut guard.cursor, single).map(|_| ()),
        };
        guard.finish(outcome)
    }

    /// Decodes exactly one row.
    ///
    /// `acquired` is the outcome of opening the cursor; a failure there is
    /// returned as-is without touching any row. An empty result closes the
    /// cursor and fails with [`SqlbindError::NoRows`].
    pub fn decode_one<C: Cursor, D: Decode + ?Sized>(&self, acquired: Result<C>, dest: &mut D) -> Result<()> {
        let cursor = acquired?;
        let mut guard = CursorGuard::new(cursor);

        let outcome = match dest.destination() {
            Destination::Sequence(_) => Err(SqlbindError::InvalidDestination(
                "single-row decoding needs a scalar, map or record destination, got a sequence".to_string(),
            )),
            single => match self.fill_first(&mut guard.cursor, single) {
                Ok(true) => Ok(()),
                Ok(false) => Err(SqlbindError::NoRows),
                Err(e) => Err(e),
            },
        };
        guard.finish(outcome)
    }

    /// Decodes every row into a sequence destination.
    pub fn decode_sequence<C: Cursor, D: Decode + ?Sized>(&self, cursor: C, dest: &mut D) -> Result<()> {
        let mut guard = CursorGuard::new(cursor);
        let outcome = match dest.destination() {
            Destination::Sequence(seq) => self.fill_sequence(&mut guard.cursor, seq),
            other => Err(SqlbindError::InvalidDestination(format!(
                "sequence decoding needs a sequence destination, got {:?}",
                other.kind()
            ))),
        };
        guard.finish(outcome)
    }

    /// Decodes the current row of `cursor` into `dest`.
    ///
    /// Never advances or closes the cursor. Sequence destinations are
    /// rejected; use [`Decoder::decode_sequence`] for those.
    pub fn decode_row(&self, cursor: &mut dyn Cursor, dest: Destination<'_>) -> Result<()> {
        let columns = cursor.column_names()?;
        let mut plan = None;
        self.decode_row_with(cursor, &columns, dest, &mut plan)
    }

    fn fill_first(&self, cursor: &mut dyn Cursor, dest: Destination<'_>) -> Result<bool> {
        if !cursor.next_row()? {
            return Ok(false);
        }
        self.decode_row(cursor, dest)?;
        Ok(true)
    }

    fn fill_sequence(&self, cursor: &mut dyn Cursor, seq: &mut dyn SequenceTarget) -> Result<()> {
        let columns = cursor.column_names()?;
        let mut plan: Option<BindingPlan> = None;
        let mut rows = 0usize;

        while cursor.next_row()? {
            seq.push_with(&mut |element| self.decode_row_with(cursor, &columns, element, &mut plan))?;
            rows += 1;
        }

        debug!(rows, "decoded sequence");
        Ok(())
    }

    fn decode_row_with(
        &self,
        cursor: &mut dyn Cursor,
        columns: &[String],
        dest: Destination<'_>,
        plan: &mut Option<BindingPlan>,
    ) -> Result<()> {
        match dest {
            Destination::Scalar(target) => cursor.scan_into(&mut [target]),
            Destination::DynamicMap(map) => decode_map(cursor, columns, map),
            Destination::Record(record) => {
                let bound = match plan.take() {
                    Some(bound) => bound,
                    None => bind_columns(record.fields(), columns, self.strict)?,
                };
                let outcome = decode_record(cursor, record, &bound);
                *plan = Some(bound);
                outcome
            }
            Destination::Sequence(_) => Err(SqlbindError::InvalidDestination(
                "a sequence cannot be decoded from a single row".to_string(),
            )),
        }
    }
}

fn decode_map(cursor: &mut dyn Cursor, columns: &[String], map: &mut RowMap) -> Result<()> {
    let mut cells: Vec<Placeholder> = (0..columns.len())
        .map(|index| Placeholder::for_hint(cursor.native_scan_type(index)))
        .collect();

    {
        let mut targets: Vec<&mut dyn ScanTarget> = cells.iter_mut().map(Placeholder::target).collect();
        cursor.scan_into(&mut targets)?;
    }

    for (column, cell) in columns.iter().zip(cells) {
        map.insert(column.clone(), materialize(cell));
    }
    Ok(())
}

fn decode_record(cursor: &mut dyn Cursor, record: &mut dyn RecordTarget, plan: &BindingPlan) -> Result<()> {
    let mut slots: Vec<Option<&mut dyn ScanTarget>> = record.slots().into_iter().map(Some).collect();
    let mut sinks = vec![Sink; plan.len()];

    let mut targets: Vec<&mut dyn ScanTarget> = Vec::with_capacity(plan.len());
    for (binding, sink) in plan.bindings().iter().zip(sinks.iter_mut()) {
        let slot = match *binding {
            Binding::Slot(index) => slots.get_mut(index).and_then(Option::take),
            Binding::Sink => None,
        };
        let target: &mut dyn ScanTarget = match slot {
            Some(slot) => slot,
            None => sink,
        };
        targets.push(target);
    }

    cursor.scan_into(&mut targets)
}

/// Decodes a whole result with a permissive [`Decoder`].
pub fn decode<C: Cursor, D: Decode + ?Sized>(cursor: C, dest: &mut D) -> Result<()> {
    Decoder::new().decode(cursor, dest)
}

/// Decodes exactly one row with a permissive [`Decoder`].
pub fn decode_one<C: Cursor, D: Decode + ?Sized>(acquired: Result<C>, dest: &mut D) -> Result<()> {
    Decoder::new().decode_one(acquired, dest)
}

/// Decodes every row into a sequence with a permissive [`Decoder`].
pub fn decode_sequence<C: Cursor, D: Decode + ?Sized>(cursor: C, dest: &mut D) -> Result<()> {
    Decoder::new().decode_sequence(cursor, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::MemoryCursor;
    use crate::core::ErrorKind;
    use crate::scan::value::Value;
    use rusqlite::types::Value as SqlValue;
    use std::sync::atomic::Ordering;

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct User {
            id: i64,
            name: String,
            created_time: String,
            updated_time: String,
        }
    }

    fn user_row(id: i64, name: &str) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(id),
            SqlValue::Text(name.to_string()),
            SqlValue::Text("2021-01-01 00:00:00".to_string()),
            SqlValue::Text("2021-01-01 00:00:00".to_string()),
        ]
    }

    fn users_cursor() -> MemoryCursor {
        MemoryCursor::new(["id", "name", "created_time", "updated_time"])
    }

    fn alice() -> User {
        User {
            id: 1,
            name: "alice".to_string(),
            created_time: "2021-01-01 00:00:00".to_string(),
            updated_time: "2021-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_decode_one_record() {
        let cursor = users_cursor().with_row(user_row(1, "alice"));
        let closes = cursor.close_counter();

        let mut user = User::default();
        decode_one(Ok(cursor), &mut user).unwrap();

        assert_eq!(user, alice());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_one_without_rows() {
        let cursor = users_cursor();
        let closes = cursor.close_counter();

        let mut user = User::default();
        let err = decode_one(Ok(cursor), &mut user).unwrap_err();

        assert!(err.is_no_rows());
        assert_eq!(user, User::default());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_one_surfaces_acquisition_failure() {
        let mut user = User::default();
        let acquired: Result<MemoryCursor> = Err(SqlbindError::Cursor("prepare failed".to_string()));

        match decode_one(acquired, &mut user) {
            Err(SqlbindError::Cursor(msg)) => assert_eq!(msg, "prepare failed"),
            other => panic!("Expected Cursor error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_one_rejects_sequence() {
        let cursor = users_cursor().with_row(user_row(1, "alice"));
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        let err = decode_one(Ok(cursor), &mut users).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidDestination);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_sequence_preserves_row_order() {
        let cursor = users_cursor()
            .with_row(user_row(1, "alice"))
            .with_row(user_row(2, "bob"))
            .with_row(user_row(3, "carol"));
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        decode_sequence(cursor, &mut users).unwrap();

        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(users[0], alice());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_error_surfaces_after_successful_decode() {
        let cursor = users_cursor()
            .with_row(user_row(1, "alice"))
            .failing_close("close refused");
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        match decode_sequence(cursor, &mut users) {
            Err(SqlbindError::Cursor(msg)) => assert_eq!(msg, "close refused"),
            other => panic!("Expected Cursor error, got {:?}", other),
        }
        assert_eq!(users, vec![alice()]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_error_wins_over_close_error() {
        let mut bad = user_row(1, "alice");
        bad[0] = SqlValue::Text("not a number".to_string());
        let cursor = users_cursor().with_row(bad).failing_close("close refused");
        let closes = cursor.close_counter();

        let mut user = User::default();
        let err = decode_one(Ok(cursor), &mut user).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScanFailure);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_sequence_empty_result() {
        let cursor = users_cursor();
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        decode_sequence(cursor, &mut users).unwrap();

        assert!(users.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_sequence_keeps_partial_results_on_scan_error() {
        let mut bad = user_row(3, "carol");
        bad[0] = SqlValue::Text("not a number".to_string());
        let cursor = users_cursor()
            .with_row(user_row(1, "alice"))
            .with_row(user_row(2, "bob"))
            .with_row(bad)
            .with_row(user_row(4, "dave"));
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        let err = decode_sequence(cursor, &mut users).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScanFailure);
        assert_eq!(users.len(), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_sequence_keeps_partial_results_on_cursor_error() {
        let cursor = users_cursor()
            .with_row(user_row(1, "alice"))
            .with_row(user_row(2, "bob"))
            .failing_at(1, "connection lost");
        let closes = cursor.close_counter();

        let mut users: Vec<User> = Vec::new();
        let err = decode_sequence(cursor, &mut users).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CursorFailure);
        assert_eq!(users, vec![alice()]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_sequence_rejects_single_destination() {
        let cursor = users_cursor().with_row(user_row(1, "alice"));
        let closes = cursor.close_counter();

        let mut user = User::default();
        let err = decode_sequence(cursor, &mut user).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidDestination);
        assert_eq!(user, User::default());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_takes_first_row_for_single_destination() {
        let cursor = users_cursor()
            .with_row(user_row(1, "alice"))
            .with_row(user_row(2, "bob"));

        let mut user = User::default();
        decode(cursor, &mut user).unwrap();
        assert_eq!(user, alice());

        let mut untouched = User::default();
        decode(users_cursor(), &mut untouched).unwrap();
        assert_eq!(untouched, User::default());
    }

    #[test]
    fn test_decode_scalar() {
        let cursor = MemoryCursor::new(["cnt"]).with_row(vec![SqlValue::Integer(1)]);
        let mut count = 0i32;
        decode_one(Ok(cursor), &mut count).unwrap();
        assert_eq!(count, 1);

        let cursor = MemoryCursor::new(["maybe"]).with_row(vec![SqlValue::Null]);
        let mut maybe: Option<String> = Some("stale".to_string());
        decode_one(Ok(cursor), &mut maybe).unwrap();
        assert_eq!(maybe, None);
    }

    #[test]
    fn test_decode_scalar_column_count_mismatch() {
        let cursor = users_cursor().with_row(user_row(1, "alice"));
        let mut id = 0i64;
        match decode_one(Ok(cursor), &mut id) {
            Err(SqlbindError::ColumnCount { expected, got }) => assert_eq!((expected, got), (4, 1)),
            other => panic!("Expected ColumnCount error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_map_converts_raw_bytes() {
        let cursor = MemoryCursor::new(["id", "name"])
            .with_hint(0, crate::core::db::NativeType::Integer)
            .with_hint(1, crate::core::db::NativeType::Text)
            .with_row(vec![SqlValue::Integer(1), SqlValue::Blob(b"alice".to_vec())]);

        let mut row = RowMap::new();
        decode_one(Ok(cursor), &mut row).unwrap();

        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("name"), Some(&Value::Text("alice".to_string())));
    }

    #[test]
    fn test_decode_map_without_hints() {
        let cursor = MemoryCursor::new(["id", "note"]).with_row(vec![SqlValue::Integer(1), SqlValue::Null]);

        let mut row = RowMap::new();
        decode_one(Ok(cursor), &mut row).unwrap();

        assert_eq!(row.len(), 2);
        assert_eq!(row["id"], Value::Integer(1));
        assert!(row["note"].is_null());
    }

    #[test]
    fn test_unmatched_columns_are_ignored() {
        let cursor = MemoryCursor::new(["name", "extra"])
            .with_row(vec![SqlValue::Text("alice".into()), SqlValue::Integer(42)]);

        let mut user = User::default();
        decode_one(Ok(cursor), &mut user).unwrap();

        assert_eq!(user.name, "alice");
        assert_eq!(user.id, 0);
        assert!(user.created_time.is_empty());
    }

    #[test]
    fn test_strict_decoder_rejects_unmatched_columns() {
        let cursor = MemoryCursor::new(["name", "extra"])
            .with_row(vec![SqlValue::Text("alice".into()), SqlValue::Integer(42)]);
        let closes = cursor.close_counter();

        let mut user = User::default();
        match Decoder::strict().decode_one(Ok(cursor), &mut user) {
            Err(SqlbindError::UnboundColumn(column)) => assert_eq!(column, "extra"),
            other => panic!("Expected UnboundColumn error, got {:?}", other),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequence_of_maps() {
        let cursor = MemoryCursor::new(["n"])
            .with_row(vec![SqlValue::Integer(1)])
            .with_row(vec![SqlValue::Integer(2)]);

        let mut rows: Vec<RowMap> = Vec::new();
        decode(cursor, &mut rows).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["n"], Value::Integer(2));
    }

    #[test]
    fn test_sequence_of_sequences_is_invalid() {
        let cursor = MemoryCursor::new(["n"]).with_row(vec![SqlValue::Integer(1)]);

        let mut nested: Vec<Vec<i64>> = Vec::new();
        let err = decode_sequence(cursor, &mut nested).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidDestination);
        assert!(nested.is_empty());
    }
}
