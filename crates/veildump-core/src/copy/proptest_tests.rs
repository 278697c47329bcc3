//! Property-based tests for COPY codec round-trips.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use super::escape::{escape_into, unescape};
use super::row::{Row, RowValue};

/// Strategy for one plain (unescaped) cell value, NULL included.
fn arb_cell() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop_oneof![
        1 => Just(None),
        4 => prop::collection::vec(any::<u8>(), 0..64).prop_map(Some),
    ]
}

/// Encodes plain cells into one COPY line.
fn encode_line(cells: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push(b'\t');
        }
        match cell {
            None => line.extend_from_slice(b"\\N"),
            Some(bytes) => escape_into(bytes, &mut line),
        }
    }
    line
}

proptest! {
    #[test]
    fn field_escape_roundtrip(value in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut escaped = Vec::new();
        escape_into(&value, &mut escaped);
        let decoded = unescape(&escaped).expect("escaped form must decode");
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn untouched_line_roundtrip(cells in prop::collection::vec(arb_cell(), 1..8)) {
        let line = encode_line(&cells);
        let mut row = Row::new(cells.len());
        row.decode(&line).expect("generated line must decode");
        // Touch every accessor to exercise the decode cache.
        for i in 0..cells.len() {
            let raw = row.raw(i).expect("cell must decode");
            prop_assert_eq!(raw, cells[i].as_deref());
        }
        prop_assert_eq!(row.encode(), line);
    }

    #[test]
    fn mutated_line_decodes_to_set_values(
        cells in prop::collection::vec(arb_cell(), 1..8),
        replacement in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let line = encode_line(&cells);
        let mut row = Row::new(cells.len());
        row.decode(&line).expect("generated line must decode");
        row.set_column(0, RowValue::Bytes(replacement.clone())).expect("index 0 exists");

        let reencoded = row.encode();
        let mut reparsed = Row::new(cells.len());
        reparsed.decode(&reencoded).expect("re-encoded line must decode");
        prop_assert_eq!(reparsed.raw(0).expect("cell must decode"), Some(replacement.as_slice()));
        for i in 1..cells.len() {
            prop_assert_eq!(reparsed.raw(i).expect("cell must decode"), cells[i].as_deref());
        }
    }
}
