//! Destination Classifier
//!
//! Every decodable type states once, through [`Decode`], which of the four
//! destination kinds it is. The decoder matches on the resulting
//! [`Destination`] and never inspects the type again.

use crate::core::db::ScanTarget;
use crate::core::Result;
use crate::scan::record::RecordTarget;
use crate::scan::value::{RawBytes, RowMap};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, Value as SqlValue};

/// A classified, mutably borrowed decode destination.
pub enum Destination<'a> {
    /// A single leaf value filled from a one-column row.
    Scalar(&'a mut dyn ScanTarget),
    /// A string-keyed map filled with one value per column.
    DynamicMap(&'a mut RowMap),
    /// A registered record filled through its column bindings.
    Record(&'a mut dyn RecordTarget),
    /// A growable list receiving one element per row.
    Sequence(&'a mut dyn SequenceTarget),
}

/// The kind of a [`Destination`], without the borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Scalar,
    DynamicMap,
    Record,
    Sequence,
}

impl Destination<'_> {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Scalar(_) => DestinationKind::Scalar,
            Destination::DynamicMap(_) => DestinationKind::DynamicMap,
            Destination::Record(_) => DestinationKind::Record,
            Destination::Sequence(_) => DestinationKind::Sequence,
        }
    }
}

/// Types that can receive decoded rows.
pub trait Decode {
    fn destination(&mut self) -> Destination<'_>;
}

/// Classifies a destination.
pub fn classify<D: Decode + ?Sized>(dest: &mut D) -> Destination<'_> {
    dest.destination()
}

/// Growable destination for multi-row decoding.
pub trait SequenceTarget {
    /// Allocates a zero-valued element, fills it with `fill`, and appends it
    /// only if `fill` succeeds.
    fn push_with(&mut self, fill: &mut dyn FnMut(Destination<'_>) -> Result<()>) -> Result<()>;
}

impl<T: Decode + Default> SequenceTarget for Vec<T> {
    fn push_with(&mut self, fill: &mut dyn FnMut(Destination<'_>) -> Result<()>) -> Result<()> {
        let mut element = T::default();
        fill(element.destination())?;
        self.push(element);
        Ok(())
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn destination(&mut self) -> Destination<'_> {
        Destination::Sequence(self)
    }
}

impl Decode for RowMap {
    fn destination(&mut self) -> Destination<'_> {
        Destination::DynamicMap(self)
    }
}

/// Leaf types decoded straight from one cell.
pub trait Scalar: FromSql {}

impl<T: Scalar> Decode for Option<T> {
    fn destination(&mut self) -> Destination<'_> {
        Destination::Scalar(self)
    }
}

macro_rules! scalar_destinations {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {}

            impl Decode for $ty {
                fn destination(&mut self) -> Destination<'_> {
                    Destination::Scalar(self)
                }
            }
        )*
    };
}

scalar_destinations!(
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    f64,
    bool,
    String,
    NaiveDateTime,
    NaiveDate,
    DateTime<Utc>,
    RawBytes,
    SqlValue,
);
