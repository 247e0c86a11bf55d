//! Column Binder
//!
//! Resolves each result column to a record slot (or to a sink) from the
//! record's static field list.

use crate::core::{Result, SqlbindError};
use crate::scan::record::{Field, FieldKind};
use std::collections::HashMap;
use tracing::debug;

/// Where one column's cell goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Slot index into the record's flattened slot list.
    Slot(usize),
    /// No field takes this column; the cell is discarded.
    Sink,
}

/// Column-aligned bindings for one record shape and column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    bindings: Vec<Binding>,
}

impl BindingPlan {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Columns routed to a sink, in column order.
    pub fn unbound<'c>(&self, columns: &'c [String]) -> Vec<&'c str> {
        self.bindings
            .iter()
            .zip(columns)
            .filter(|(binding, _)| **binding == Binding::Sink)
            .map(|(_, column)| column.as_str())
            .collect()
    }
}

/// Normalized form used for name-convention matching: first letter upper-cased.
pub fn normalize_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Default)]
struct BindingTable {
    tagged: HashMap<&'static str, usize>,
    named: HashMap<String, usize>,
}

impl BindingTable {
    fn build(fields: &'static [Field]) -> Self {
        let mut table = BindingTable::default();
        let mut next_slot = 0;
        table.register(fields, &mut next_slot, 0);
        table
    }

    fn register(&mut self, fields: &'static [Field], next_slot: &mut usize, depth: usize) {
        for field in fields {
            match field.kind {
                FieldKind::Leaf => {
                    if let Some(tag) = field.tag.filter(|tag| !tag.is_empty()) {
                        self.tagged.insert(tag, *next_slot);
                    }
                    self.named.insert(normalize_name(field.name), *next_slot);
                    *next_slot += 1;
                }
                FieldKind::Embedded(inner) if depth == 0 => {
                    self.register(inner, next_slot, depth + 1);
                }
                FieldKind::Embedded(_) => {
                    // Only one level of embedding is bound; deeper slots stay unbound.
                    *next_slot += field.slot_count();
                }
            }
        }
    }

    fn resolve(&self, column: &str) -> Option<usize> {
        self.tagged
            .get(column)
            .or_else(|| self.named.get(&normalize_name(column)))
            .copied()
    }
}

/// Binds `columns` to the slots of a record described by `fields`.
///
/// An explicit tag is matched against the column name exactly and wins over
/// the name convention. Unmatched columns bind to a sink unless `strict` is
/// set, in which case the first one is reported as
/// [`SqlbindError::UnboundColumn`]. When several columns resolve to the same
/// slot the last of them keeps it.
pub fn bind_columns(fields: &'static [Field], columns: &[String], strict: bool) -> Result<BindingPlan> {
    let table = BindingTable::build(fields);

    let mut bindings: Vec<Binding> = columns
        .iter()
        .map(|column| table.resolve(column).map_or(Binding::Sink, Binding::Slot))
        .collect();

    let mut claimed = vec![false; fields.iter().map(Field::slot_count).sum()];
    for binding in bindings.iter_mut().rev() {
        if let Binding::Slot(slot) = *binding {
            if claimed[slot] {
                *binding = Binding::Sink;
            } else {
                claimed[slot] = true;
            }
        }
    }

    let plan = BindingPlan { bindings };
    let unbound = plan.unbound(columns);
    if !unbound.is_empty() {
        if strict {
            return Err(SqlbindError::UnboundColumn(unbound[0].to_string()));
        }
        debug!(columns = ?unbound, "columns without a destination field are discarded");
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUDIT: &[Field] = &[
        Field::leaf("created_time", None),
        Field::leaf("updated_time", None),
    ];

    const USER: &[Field] = &[
        Field::leaf("user_id", Some("uid")),
        Field::leaf("uid", None),
        Field::leaf("name", None),
        Field::embedded("audit", AUDIT),
    ];

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("name"), "Name");
        assert_eq!(normalize_name("created_time"), "Created_time");
        assert_eq!(normalize_name("Id"), "Id");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_tag_wins_over_name_convention() {
        let plan = bind_columns(USER, &columns(&["uid"]), false).unwrap();
        assert_eq!(plan.bindings(), &[Binding::Slot(0)]);
    }

    #[test]
    fn test_name_convention_binding() {
        let plan = bind_columns(USER, &columns(&["name", "Name"]), false).unwrap();
        // Both normalize to the same key; the later column keeps the slot.
        assert_eq!(plan.bindings(), &[Binding::Sink, Binding::Slot(2)]);
    }

    #[test]
    fn test_embedded_fields_bind_in_place() {
        let plan = bind_columns(USER, &columns(&["updated_time", "created_time"]), false).unwrap();
        assert_eq!(plan.bindings(), &[Binding::Slot(4), Binding::Slot(3)]);
    }

    #[test]
    fn test_unmatched_columns_go_to_sink() {
        let cols = columns(&["name", "extra"]);
        let plan = bind_columns(USER, &cols, false).unwrap();
        assert_eq!(plan.bindings(), &[Binding::Slot(2), Binding::Sink]);
        assert_eq!(plan.unbound(&cols), vec!["extra"]);
    }

    #[test]
    fn test_strict_mode_rejects_unmatched_columns() {
        match bind_columns(USER, &columns(&["name", "extra"]), true) {
            Err(SqlbindError::UnboundColumn(column)) => assert_eq!(column, "extra"),
            other => panic!("Expected UnboundColumn error, got {:?}", other),
        }
        assert!(bind_columns(USER, &columns(&["name", "uid"]), true).is_ok());
    }

    #[test]
    fn test_later_fields_overwrite_earlier_keys() {
        const INNER: &[Field] = &[Field::leaf("id", None)];
        const SHADOWED: &[Field] = &[Field::leaf("id", None), Field::embedded("audit", INNER)];
        let plan = bind_columns(SHADOWED, &columns(&["id"]), false).unwrap();
        assert_eq!(plan.bindings(), &[Binding::Slot(1)]);
    }

    #[test]
    fn test_second_level_embedding_is_not_bound() {
        const INNER: &[Field] = &[Field::leaf("deep", None)];
        const MIDDLE: &[Field] = &[Field::embedded("inner", INNER), Field::leaf("mid", None)];
        const OUTER: &[Field] = &[Field::embedded("middle", MIDDLE), Field::leaf("top", None)];

        let plan = bind_columns(OUTER, &columns(&["deep", "mid", "top"]), false).unwrap();
        assert_eq!(plan.bindings(), &[Binding::Sink, Binding::Slot(1), Binding::Slot(2)]);
    }
}
