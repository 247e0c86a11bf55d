//! Record descriptors.
//!
//! A record is a plain struct whose shape is described once, at compile time,
//! by a [`Record`] implementation: the ordered field list in [`Record::FIELDS`]
//! and the matching mutable slots from [`Record::slots`]. The [`record!`]
//! macro writes both from an ordinary struct definition.
//!
//! [`record!`]: crate::record

use crate::core::db::ScanTarget;

/// Kind of a declared record field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A single value scanned from one column.
    Leaf,
    /// An embedded record whose fields are bound as if declared in place.
    Embedded(&'static [Field]),
}

/// One declared field of a record.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Field name as declared.
    pub name: &'static str,
    /// Explicit column binding, when the field carries one.
    pub tag: Option<&'static str>,
    pub kind: FieldKind,
}

impl Field {
    pub const fn leaf(name: &'static str, tag: Option<&'static str>) -> Self {
        Field {
            name,
            tag,
            kind: FieldKind::Leaf,
        }
    }

    pub const fn embedded(name: &'static str, fields: &'static [Field]) -> Self {
        Field {
            name,
            tag: None,
            kind: FieldKind::Embedded(fields),
        }
    }

    /// Number of scan slots this field contributes, embedded records included.
    pub fn slot_count(&self) -> usize {
        match self.kind {
            FieldKind::Leaf => 1,
            FieldKind::Embedded(fields) => fields.iter().map(Field::slot_count).sum(),
        }
    }
}

/// A fixed-shape aggregate decoded from one row.
///
/// `slots` must return one slot per leaf of `FIELDS`, in declaration order,
/// with each embedded record contributing its own slots in place.
pub trait Record: Default {
    const FIELDS: &'static [Field];

    fn slots(&mut self) -> Vec<&mut dyn ScanTarget>;
}

/// Object-safe view of a [`Record`] used by the row decoder.
pub trait RecordTarget {
    fn fields(&self) -> &'static [Field];

    fn slots(&mut self) -> Vec<&mut dyn ScanTarget>;
}

impl<R: Record> RecordTarget for R {
    fn fields(&self) -> &'static [Field] {
        R::FIELDS
    }

    fn slots(&mut self) -> Vec<&mut dyn ScanTarget> {
        Record::slots(self)
    }
}

/// Declares a struct and registers it as a decodable record.
///
/// Fields bind to columns by name; `#[column = "..."]` binds a field to an
/// exact column instead, and `#[embed]` flattens another record's fields into
/// this one. Those two markers are consumed by the macro. Every other field
/// attribute, doc comments and derive helpers such as `#[serde(...)]`
/// included, is kept on the generated struct.
///
/// ```
/// sqlbind::record! {
///     #[derive(Debug, Default)]
///     pub struct Audit {
///         pub created_time: String,
///         pub updated_time: String,
///     }
/// }
///
/// sqlbind::record! {
///     #[derive(Debug, Default)]
///     pub struct User {
///         /// Primary key.
///         #[column = "uid"]
///         pub id: i64,
///         pub name: String,
///         #[embed]
///         pub audit: Audit,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$($attr:tt)*])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::__record_struct! {
            @head [$(#[$meta])* $vis struct $name]
            @done []
            @todo [$( [$(#[$($attr)*])*] [] $field_vis $field : $ty ; )*]
        }

        impl $crate::Record for $name {
            const FIELDS: &'static [$crate::Field] = &[
                $( $crate::__record_field!($field, $ty $(, [$($attr)*])*), )*
            ];

            fn slots(&mut self) -> ::std::vec::Vec<&mut dyn $crate::ScanTarget> {
                let mut slots: ::std::vec::Vec<&mut dyn $crate::ScanTarget> = ::std::vec::Vec::new();
                $( $crate::__record_slot!(slots, self.$field $(, [$($attr)*])*); )*
                slots
            }
        }

        impl $crate::Decode for $name {
            fn destination(&mut self) -> $crate::Destination<'_> {
                $crate::Destination::Record(self)
            }
        }
    };
}

/// Emits the struct, dropping the binding markers from each field.
///
/// Each pending field is `[attributes to sort] [attributes kept] vis name: ty;`.
#[doc(hidden)]
#[macro_export]
macro_rules! __record_struct {
    (@head [$($head:tt)*] @done [$($done:tt)*] @todo []) => {
        $($head)* { $($done)* }
    };
    (@head $head:tt @done [$($done:tt)*] @todo [
        [] [$($kept:tt)*] $field_vis:vis $field:ident : $ty:ty ; $($rest:tt)*
    ]) => {
        $crate::__record_struct! {
            @head $head
            @done [$($done)* $($kept)* $field_vis $field: $ty,]
            @todo [$($rest)*]
        }
    };
    (@head $head:tt @done $done:tt @todo [
        [#[column = $tag:literal] $($attrs:tt)*] $kept:tt $($rest:tt)*
    ]) => {
        $crate::__record_struct! { @head $head @done $done @todo [[$($attrs)*] $kept $($rest)*] }
    };
    (@head $head:tt @done $done:tt @todo [
        [#[embed] $($attrs:tt)*] $kept:tt $($rest:tt)*
    ]) => {
        $crate::__record_struct! { @head $head @done $done @todo [[$($attrs)*] $kept $($rest)*] }
    };
    (@head $head:tt @done $done:tt @todo [
        [#[$($attr:tt)*] $($attrs:tt)*] [$($kept:tt)*] $($rest:tt)*
    ]) => {
        $crate::__record_struct! {
            @head $head
            @done $done
            @todo [[$($attrs)*] [$($kept)* #[$($attr)*]] $($rest)*]
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_field {
    ($field:ident, $ty:ty) => {
        $crate::Field::leaf(stringify!($field), None)
    };
    ($field:ident, $ty:ty, [column = $tag:literal] $(, $rest:tt)*) => {
        $crate::Field::leaf(stringify!($field), Some($tag))
    };
    ($field:ident, $ty:ty, [embed] $(, $rest:tt)*) => {
        $crate::Field::embedded(stringify!($field), <$ty as $crate::Record>::FIELDS)
    };
    ($field:ident, $ty:ty, $other:tt $(, $rest:tt)*) => {
        $crate::__record_field!($field, $ty $(, $rest)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_slot {
    ($slots:ident, $value:expr) => {
        $slots.push(&mut $value)
    };
    ($slots:ident, $value:expr, [embed] $(, $rest:tt)*) => {
        $slots.extend($crate::Record::slots(&mut $value))
    };
    ($slots:ident, $value:expr, $other:tt $(, $rest:tt)*) => {
        $crate::__record_slot!($slots, $value $(, $rest)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Audit {
            created_time: String,
            updated_time: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Account {
            #[column = "uid"]
            id: i64,
            name: String,
            #[embed]
            audit: Audit,
        }
    }

    #[test]
    fn test_fields_follow_declaration_order() {
        let names: Vec<&str> = Account::FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["id", "name", "audit"]);
        assert_eq!(Account::FIELDS[0].tag, Some("uid"));
        assert_eq!(Account::FIELDS[1].tag, None);
        assert!(matches!(Account::FIELDS[2].kind, FieldKind::Embedded(fields) if fields.len() == 2));
    }

    #[test]
    fn test_slots_cover_every_leaf() {
        let slot_count: usize = Account::FIELDS.iter().map(Field::slot_count).sum();
        assert_eq!(slot_count, 4);

        let mut account = Account::default();
        assert_eq!(Record::slots(&mut account).len(), 4);
    }

    #[test]
    fn test_slots_write_through() {
        let mut account = Account::default();
        {
            let mut slots = Record::slots(&mut account);
            slots[0].scan(rusqlite::types::ValueRef::Integer(9)).unwrap();
            slots[3].scan(rusqlite::types::ValueRef::Text(b"later")).unwrap();
        }
        assert_eq!(account.id, 9);
        assert_eq!(account.audit.updated_time, "later");
    }

    crate::record! {
        #[derive(Debug, Default, serde::Serialize)]
        struct Profile {
            /// Stored under its own column name.
            #[column = "uid"]
            #[serde(skip)]
            id: i64,
            #[serde(rename = "full_name")]
            name: String,
        }
    }

    #[test]
    fn test_other_field_attributes_are_kept() {
        assert_eq!(Profile::FIELDS[0].tag, Some("uid"));
        assert_eq!(Profile::FIELDS[1].tag, None);

        let profile = Profile {
            id: 3,
            name: "Ada".to_string(),
        };
        assert_eq!(serde_json::to_string(&profile).unwrap(), r#"{"full_name":"Ada"}"#);
    }
}
