use std::collections::BTreeSet;

use covid_data_public::{
    common_csv::{read_canonical, write_csv_string},
    data::{Value, format_cell, format_float, parse_cell},
    events::CaptureSink,
    fields::{self, FIELDS},
    io_utils,
    table::{Table, int, text},
};
use proptest::prelude::*;

fn column_name() -> impl Strategy<Value = String> {
    prop_oneof![
        proptest::sample::select(FIELDS.to_vec()).prop_map(|f| f.name().to_string()),
        "[a-z][a-z0-9_]{0,8}",
    ]
}

/// Text that a naive reader would mistake for a number.
fn numeric_looking_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "0[0-9]{1,4}",
        "[0-9]{1,3}\\.[0-9]{0,2}0",
        "[1-9]e[0-9]",
        "[a-z]{1,6}",
        "[0-9]{1,5}",
    ]
}

/// Every non-missing cell as (fips, date, column, rendered value).
fn cell_triples(table: &Table) -> BTreeSet<(String, String, String, String)> {
    let columns = table.all_column_names();
    let mut triples = BTreeSet::new();
    for (idx, row) in table.rows().iter().enumerate() {
        let fips = format_cell(table.cell(idx, "fips").unwrap());
        let date = format_cell(table.cell(idx, "date").unwrap());
        for (name, cell) in columns.iter().zip(row) {
            if cell.is_some() && !matches!(name.as_str(), "fips" | "date") {
                triples.insert((fips.clone(), date.clone(), name.clone(), format_cell(cell)));
            }
        }
    }
    triples
}

proptest! {
    #[test]
    fn integral_floats_print_like_integers(value in -999_999_999_999i64..999_999_999_999i64) {
        prop_assert_eq!(format_float(value as f64), value.to_string());
    }

    #[test]
    fn formatted_floats_parse_back_within_precision(value in -1.0e15f64..1.0e15f64) {
        let text = format_float(value);
        prop_assert!(!text.ends_with(".0"));
        let parsed = match parse_cell(&text) {
            Some(Value::Integer(i)) => i as f64,
            Some(Value::Float(f)) => f,
            other => return Err(TestCaseError::fail(format!("unexpected cell {other:?}"))),
        };
        let tolerance = value.abs().max(1e-300) * 1e-11;
        prop_assert!((parsed - value).abs() <= tolerance, "{} -> {} -> {}", value, text, parsed);
    }

    #[test]
    fn column_order_puts_registry_fields_first(names in proptest::collection::hash_set(column_name(), 0..12)) {
        let names = names.into_iter().collect::<Vec<_>>();
        let sorted = fields::sort_column_names(&names);
        prop_assert_eq!(fields::sort_column_names(&sorted), sorted.clone());
        let first_extra = sorted.iter().position(|n| fields::lookup(n).is_none());
        if let Some(pos) = first_extra {
            prop_assert!(sorted[pos..].iter().all(|n| fields::lookup(n).is_none()));
            prop_assert!(sorted[pos..].windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn canonical_csv_round_trips(
        rows in proptest::collection::btree_map(
            (0u32..100, 1u32..29),
            (
                proptest::option::of(0i64..1_000_000),
                proptest::option::of(numeric_looking_text()),
            ),
            0..20,
        )
    ) {
        let rows = rows
            .into_iter()
            .map(|((fips, day), (cases, code))| {
                vec![
                    text(&format!("{fips:05}")),
                    text(&format!("2020-02-{day:02}")),
                    cases.and_then(|c| int(c)),
                    code.and_then(|c| text(&c)),
                ]
            })
            .collect::<Vec<_>>();
        let table = Table::from_literals(&["fips", "date", "cases", "zz_code"], rows).unwrap();
        let expected = cell_triples(&table);
        let mut sink = CaptureSink::new();
        let first = write_csv_string(table, &mut sink).unwrap();
        let reread = read_canonical(io_utils::open_csv_reader(first.as_bytes(), b',', true)).unwrap();
        prop_assert_eq!(cell_triples(&reread), expected);
        let second = write_csv_string(reread, &mut sink).unwrap();
        prop_assert_eq!(first, second);
    }
}
