//! Cursor Module
//!
//! Forward-only cursors over tabular results and the row-scan primitive that
//! moves one row of raw driver cells into caller-provided scan targets.
//!
//! Two cursors are provided: [`SqliteCursor`] steps a prepared rusqlite
//! statement, [`MemoryCursor`] replays rows that are already in memory.

use crate::core::{Result, SqlbindError};
use rusqlite::types::{FromSql, FromSqlResult, Value as SqlValue, ValueRef};
use rusqlite::{Params, Rows, Statement};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Anything a single raw driver cell can be assigned into.
///
/// Every [`FromSql`] type is a scan target; the conversion rules are rusqlite's.
pub trait ScanTarget {
    /// Replaces the current value with the converted cell.
    fn scan(&mut self, cell: ValueRef<'_>) -> FromSqlResult<()>;
}

impl<T: FromSql> ScanTarget for T {
    fn scan(&mut self, cell: ValueRef<'_>) -> FromSqlResult<()> {
        *self = T::column_result(cell)?;
        Ok(())
    }
}

/// Disposable scan target for columns with no destination field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sink;

impl FromSql for Sink {
    fn column_result(_value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Sink)
    }
}

/// Storage class a cursor expects a column to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    Date,
    Timestamp,
}

impl NativeType {
    /// Derives a type hint from a declared column type using SQLite affinity rules.
    ///
    /// Boolean, date and timestamp declarations are recognised before the
    /// affinity rules so `BOOLEAN`, `DATE` and `DATETIME` columns keep their meaning.
    pub fn from_decl_type(decl: &str) -> Option<Self> {
        let decl = decl.to_uppercase();
        if decl.contains("BOOL") {
            Some(NativeType::Boolean)
        } else if decl.contains("TIME") {
            Some(NativeType::Timestamp)
        } else if decl.contains("DATE") {
            Some(NativeType::Date)
        } else if decl.contains("INT") {
            Some(NativeType::Integer)
        } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            Some(NativeType::Text)
        } else if decl.contains("BLOB") {
            Some(NativeType::Blob)
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            Some(NativeType::Real)
        } else {
            None
        }
    }
}

/// An open, forward-only handle over a tabular result.
pub trait Cursor {
    /// Column names in result order.
    fn column_names(&self) -> Result<Vec<String>>;

    /// Advances to the next row, returning `false` once the result is exhausted.
    fn next_row(&mut self) -> Result<bool>;

    /// Scans the current row into `targets`, one target per column.
    fn scan_into(&self, targets: &mut [&mut dyn ScanTarget]) -> Result<()>;

    /// Type hint for the column at `index`, when the driver reports one.
    fn native_scan_type(&self, index: usize) -> Option<NativeType>;

    /// Releases the underlying result. Further calls to `next_row` report no rows.
    fn close(&mut self) -> Result<()>;
}

/// The row-scan primitive shared by every cursor.
///
/// Fails with [`SqlbindError::ColumnCount`] when the number of targets differs
/// from the number of cells, and with [`SqlbindError::Scan`] naming the first
/// column whose cell its target rejects.
pub fn scan_values<'v, I>(columns: &[String], cells: I, targets: &mut [&mut dyn ScanTarget]) -> Result<()>
where
    I: ExactSizeIterator<Item = ValueRef<'v>>,
{
    if cells.len() != targets.len() {
        return Err(SqlbindError::ColumnCount {
            expected: cells.len(),
            got: targets.len(),
        });
    }

    for (index, (cell, target)) in cells.zip(targets.iter_mut()).enumerate() {
        target.scan(cell).map_err(|source| SqlbindError::Scan {
            column: columns.get(index).cloned().unwrap_or_else(|| index.to_string()),
            source,
        })?;
    }
    Ok(())
}

/// Cursor over a prepared rusqlite statement.
///
/// Each row is copied out of the statement when the cursor advances, so
/// scanning never holds a borrow of the driver's row buffer.
pub struct SqliteCursor<'stmt> {
    rows: Option<Rows<'stmt>>,
    columns: Vec<String>,
    hints: Vec<Option<NativeType>>,
    current: Option<Vec<SqlValue>>,
}

impl<'stmt> SqliteCursor<'stmt> {
    /// Binds `params` and starts stepping `stmt`.
    pub fn open<P: Params>(stmt: &'stmt mut Statement<'_>, params: P) -> Result<Self> {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let hints = stmt
            .columns()
            .iter()
            .map(|column| column.decl_type().and_then(NativeType::from_decl_type))
            .collect();
        let rows = stmt.query(params)?;

        Ok(SqliteCursor {
            rows: Some(rows),
            columns,
            hints,
            current: None,
        })
    }
}

impl Cursor for SqliteCursor<'_> {
    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<bool> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(false);
        };

        match rows.next() {
            Ok(Some(row)) => {
                let values = (0..self.columns.len())
                    .map(|index| row.get_ref(index).map(SqlValue::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(|e| SqlbindError::Cursor(format!("Failed to read row: {}", e)))?;
                self.current = Some(values);
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                Ok(false)
            }
            Err(e) => {
                self.current = None;
                Err(SqlbindError::Cursor(format!("Failed to step statement: {}", e)))
            }
        }
    }

    fn scan_into(&self, targets: &mut [&mut dyn ScanTarget]) -> Result<()> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| SqlbindError::Cursor("scan called without a current row".to_string()))?;
        scan_values(&self.columns, row.iter().map(ValueRef::from), targets)
    }

    fn native_scan_type(&self, index: usize) -> Option<NativeType> {
        self.hints.get(index).copied().flatten()
    }

    fn close(&mut self) -> Result<()> {
        if self.rows.take().is_some() {
            trace!("sqlite cursor closed");
        }
        self.current = None;
        Ok(())
    }
}

/// Cursor over rows that are already in memory.
///
/// Serves as a stand-in for a driver result in tests, and for callers that
/// fetched rows elsewhere but want them decoded the same way.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    columns: Vec<String>,
    hints: Vec<Option<NativeType>>,
    rows: Vec<Vec<SqlValue>>,
    position: Option<usize>,
    fail_at: Option<(usize, String)>,
    close_error: Option<String>,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

impl MemoryCursor {
    /// Creates a cursor with the given column names and no rows.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        MemoryCursor {
            hints: vec![None; columns.len()],
            columns,
            rows: Vec::new(),
            position: None,
            fail_at: None,
            close_error: None,
            closed: false,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Appends a row.
    pub fn with_row(mut self, row: Vec<SqlValue>) -> Self {
        self.rows.push(row);
        self
    }

    /// Sets the type hint reported for the column at `index`.
    pub fn with_hint(mut self, index: usize, hint: NativeType) -> Self {
        if let Some(slot) = self.hints.get_mut(index) {
            *slot = Some(hint);
        }
        self
    }

    /// Makes advancing onto row `index` (zero based) fail with a cursor error.
    pub fn failing_at(mut self, index: usize, message: impl Into<String>) -> Self {
        self.fail_at = Some((index, message.into()));
        self
    }

    /// Makes `close` fail with a cursor error after releasing the rows.
    pub fn failing_close(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    /// Shared counter of `close` calls, readable after the cursor is consumed.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl Cursor for MemoryCursor {
    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }

        let next = self.position.map_or(0, |p| p + 1);
        if let Some((index, message)) = &self.fail_at {
            if *index == next {
                return Err(SqlbindError::Cursor(message.clone()));
            }
        }

        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn scan_into(&self, targets: &mut [&mut dyn ScanTarget]) -> Result<()> {
        let row = self
            .position
            .filter(|_| !self.closed)
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| SqlbindError::Cursor("scan called without a current row".to_string()))?;
        scan_values(&self.columns, row.iter().map(ValueRef::from), targets)
    }

    fn native_scan_type(&self, index: usize) -> Option<NativeType> {
        self.hints.get(index).copied().flatten()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(SqlbindError::Cursor(message.clone())),
            None => Ok(()),
        }
    }
}
