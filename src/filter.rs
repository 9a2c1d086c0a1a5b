//! Row-level cleanup shared by every source: trimming text, coercing dates
//! and dropping rows that lack the values a timeseries row needs.

use anyhow::Result;
use serde_json::json;

use crate::{
    data::{Cell, Value, format_cell, parse_naive_date},
    events::{self, Event, EventSink},
    render,
    table::Table,
};

const MAX_LOGGED_ROWS: usize = 20;

/// Trims surrounding whitespace from every text cell. Cells that become
/// empty stay as empty text rather than turning into missing values.
pub fn strip_whitespace(table: Table) -> Table {
    table.map_cells(|cell| match cell {
        Some(Value::String(s)) => Some(Value::String(s.trim().to_string())),
        other => other,
    })
}

/// Converts `column` to dates. Rows whose value cannot be parsed are logged
/// and dropped; missing values are left for [`drop_rows_missing`].
pub fn parse_date_column(table: Table, column: &str, sink: &mut dyn EventSink) -> Result<Table> {
    let values = table.column(column)?;
    let mut parsed = Vec::with_capacity(values.len());
    let mut keep = Vec::with_capacity(values.len());
    let mut bad_values = Vec::new();
    for cell in values {
        let converted = match cell {
            None => Ok(None),
            Some(Value::Date(d)) => Ok(Some(Value::Date(*d))),
            Some(other) => parse_naive_date(&other.as_display()).map(|d| Some(Value::Date(d))),
        };
        match converted {
            Ok(value) => {
                parsed.push(value);
                keep.push(true);
            }
            Err(_) => {
                bad_values.push(format_cell(cell));
                parsed.push(None);
                keep.push(false);
            }
        }
    }
    if !bad_values.is_empty() {
        bad_values.sort();
        bad_values.dedup();
        sink.emit(
            Event::warn(events::DROPPING_BAD_DATES)
                .with("column", column)
                .with("bad_values", json!(bad_values)),
        );
    }
    let table = table.set_column(column, parsed)?;
    Ok(table.filter_rows(&keep))
}

fn is_missing(cell: &Cell) -> bool {
    match cell {
        None => true,
        Some(Value::Float(f)) => f.is_nan(),
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Drops rows with a missing value in any of `columns`, warning with a
/// rendering of the dropped rows.
pub fn drop_rows_missing<S: AsRef<str>>(
    table: Table,
    columns: &[S],
    sink: &mut dyn EventSink,
) -> Result<Table> {
    let positions = columns
        .iter()
        .map(|c| {
            table
                .position(c.as_ref())
                .ok_or_else(|| crate::error::TableError::MissingColumn(c.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let keep = table
        .rows()
        .iter()
        .map(|row| positions.iter().all(|&pos| !is_missing(&row[pos])))
        .collect::<Vec<_>>();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        let inverse = keep.iter().map(|k| !k).collect::<Vec<_>>();
        let bad = table.clone().filter_rows(&inverse);
        sink.emit(
            Event::warn(events::DROPPING_NULL_ROWS)
                .with(
                    "columns",
                    json!(columns.iter().map(|c| c.as_ref()).collect::<Vec<_>>()),
                )
                .with(
                    "bad_rows",
                    format!(
                        "{dropped} rows\n{}",
                        render::render_table(&bad, Some(MAX_LOGGED_ROWS))
                    ),
                ),
        );
    }
    Ok(table.filter_rows(&keep))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        events::CaptureSink,
        table::{int, text},
    };

    #[test]
    fn strip_whitespace_trims_text_only() {
        let table = Table::from_literals(
            &["col_a", "col_b", "col_num"],
            vec![
                vec![text(" "), text("b1"), int(1)],
                vec![text("a2"), text(" b2 "), int(2)],
            ],
        )
        .unwrap();
        let out = strip_whitespace(table);
        assert_eq!(out.rows()[0], vec![text(""), text("b1"), int(1)]);
        assert_eq!(out.rows()[1], vec![text("a2"), text("b2"), int(2)]);
    }

    #[test]
    fn parse_date_column_drops_unparseable_rows() {
        let table = Table::from_literals(
            &["date", "cases"],
            vec![
                vec![text("2020-06-01"), int(1)],
                vec![text("not a date"), int(2)],
                vec![text("06/02/2020"), int(3)],
            ],
        )
        .unwrap();
        let mut sink = CaptureSink::new();
        let out = parse_date_column(table, "date", &mut sink).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(
            out.cell(1, "date"),
            Some(&Some(Value::Date(NaiveDate::from_ymd_opt(2020, 6, 2).unwrap())))
        );
        assert_eq!(sink.events[0].field("bad_values"), Some(&json!(["not a date"])));
    }

    #[test]
    fn drop_rows_missing_reports_count() {
        let table = Table::from_literals(
            &["fips", "date", "state"],
            vec![
                vec![text("06"), text("2020-06-01"), text("CA")],
                vec![text("0"), text("2020-06-01"), None],
                vec![text("0"), text("2020-06-02"), None],
            ],
        )
        .unwrap();
        let mut sink = CaptureSink::new();
        let out = drop_rows_missing(table, &["fips", "date", "state"], &mut sink).unwrap();
        assert_eq!(out.len(), 1);
        let bad_rows = sink.events[0].field("bad_rows").unwrap().as_str().unwrap();
        assert!(bad_rows.contains("2 rows"));
    }
}
