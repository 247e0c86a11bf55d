//! Property-based tests for row decoding
//!
//! These tests verify, over generated results, that:
//! - Sequence decoding yields one element per row, in row order
//! - Columns without a destination field never make decoding fail

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sqlbind::{decode_sequence, MemoryCursor, SqlValue};

    sqlbind::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Item {
            id: i64,
            label: String,
        }
    }

    fn arb_rows() -> impl Strategy<Value = Vec<(i64, String)>> {
        prop::collection::vec((any::<i64>(), "[a-z]{0,12}"), 0..40)
    }

    fn arb_extra_columns() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("x_[a-z]{1,8}", 0..5)
    }

    fn cursor_for(rows: &[(i64, String)], extra: &[String]) -> MemoryCursor {
        let columns = ["id".to_string(), "label".to_string()]
            .into_iter()
            .chain(extra.iter().cloned());
        let mut cursor = MemoryCursor::new(columns);
        for (id, label) in rows {
            let mut row = vec![SqlValue::Integer(*id), SqlValue::Text(label.clone())];
            row.extend(extra.iter().map(|name| SqlValue::Text(name.clone())));
            cursor = cursor.with_row(row);
        }
        cursor
    }

    proptest! {
        #[test]
        fn prop_sequence_preserves_row_count_and_order(rows in arb_rows()) {
            let mut items: Vec<Item> = Vec::new();
            decode_sequence(cursor_for(&rows, &[]), &mut items).unwrap();

            prop_assert_eq!(items.len(), rows.len());
            for (item, (id, label)) in items.iter().zip(&rows) {
                prop_assert_eq!(item.id, *id);
                prop_assert_eq!(&item.label, label);
            }
        }

        #[test]
        fn prop_unmatched_columns_never_fail(rows in arb_rows(), extra in arb_extra_columns()) {
            let mut items: Vec<Item> = Vec::new();
            let result = decode_sequence(cursor_for(&rows, &extra), &mut items);

            prop_assert!(result.is_ok(), "decoding failed with extra columns {:?}", extra);
            prop_assert_eq!(items.len(), rows.len());
        }
    }
}
