//! Establishes the canonical (fips, date) index and deterministic column order.
//!
//! [`fix_index`] never resolves duplicate keys. Callers pick a
//! [`DuplicatePolicy`] per source and apply it with [`resolve_duplicate_keys`].

use std::collections::HashMap;

use anyhow::Result;
use clap::ValueEnum;
use log::Level;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    data::format_cell,
    error::DuplicateKeysError,
    events::{self, Event, EventSink},
    fields::{self, TIMESERIES_KEYS},
    table::{POSITIONAL_INDEX, Table},
};

/// Returns `table` indexed by (fips, date), sorted by that index, without a
/// stray `index` column and with columns in registry order.
pub fn fix_index(table: Table, sink: &mut dyn EventSink) -> Result<Table> {
    let keys = fields::timeseries_key_names();
    let table = if table.index_names() == keys.as_slice() {
        table
    } else {
        sink.emit(
            Event::warn(events::FIXING_INDEX).with("current_index", json!(table.index_names())),
        );
        let table = if table.has_index() {
            table.reset_index()?
        } else {
            table
        };
        table.set_index(&keys)?
    };
    let mut table = table.sort_by_index();

    if table.column_names().iter().any(|c| c == POSITIONAL_INDEX) {
        sink.emit(Event::warn(events::DROPPING_INDEX_COLUMN).with("column", POSITIONAL_INDEX));
        table = table.drop_columns(&[POSITIONAL_INDEX]);
    }

    sort_common_field_columns(table)
}

/// Orders columns by registry position, unknown columns last and alphabetical.
pub fn sort_common_field_columns(table: Table) -> Result<Table> {
    let order = fields::sort_column_names(table.column_names());
    Ok(table.select(&order)?)
}

/// Drops every column that is not a registry field.
pub fn only_common_columns(table: Table, sink: &mut dyn EventSink) -> Table {
    let extra_columns = table
        .column_names()
        .iter()
        .filter(|c| fields::lookup(c).is_none())
        .cloned()
        .collect::<Vec<_>>();
    if extra_columns.is_empty() {
        return table;
    }
    let mut sorted = extra_columns.clone();
    sorted.sort();
    sink.emit(Event::warn(events::DROPPING_EXTRA_COLUMNS).with("extra_columns", json!(sorted)));
    table.drop_columns(&extra_columns)
}

/// How a caller wants repeated (fips, date) keys handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the last row seen for each key, as for sources that publish vintages.
    KeepLast,
    /// Remove every row whose key is repeated.
    DropAll,
    /// Abort with the repeated keys.
    #[default]
    Fail,
}

/// Renders the key cells of a row as `fips,date`.
fn key_text(table: &Table, row: usize, positions: &[usize]) -> String {
    positions
        .iter()
        .map(|&pos| format_cell(&table.rows()[row][pos]))
        .collect::<Vec<_>>()
        .join(",")
}

/// Finds repeated (fips, date) keys, returning each key once with the rows
/// that carry it, in first-seen order.
pub fn find_duplicate_keys(table: &Table) -> Result<Vec<(String, Vec<usize>)>> {
    let positions = TIMESERIES_KEYS
        .iter()
        .map(|field| {
            table
                .position(field.name())
                .ok_or_else(|| crate::error::TableError::MissingColumn(field.name().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut order = Vec::new();
    let mut rows_by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..table.len() {
        let key = key_text(table, row, &positions);
        let rows = rows_by_key.entry(key.clone()).or_default();
        if rows.is_empty() {
            order.push(key);
        }
        rows.push(row);
    }
    Ok(order
        .into_iter()
        .filter_map(|key| {
            let rows = rows_by_key.remove(&key)?;
            (rows.len() > 1).then_some((key, rows))
        })
        .collect())
}

pub fn resolve_duplicate_keys(
    table: Table,
    policy: DuplicatePolicy,
    sink: &mut dyn EventSink,
) -> Result<Table> {
    let duplicates = find_duplicate_keys(&table)?;
    if duplicates.is_empty() {
        return Ok(table);
    }
    let keys = duplicates.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();
    let mut keep = vec![true; table.len()];
    match policy {
        DuplicatePolicy::Fail => return Err(DuplicateKeysError { keys }.into()),
        DuplicatePolicy::KeepLast => {
            for (_, rows) in &duplicates {
                for &row in &rows[..rows.len() - 1] {
                    keep[row] = false;
                }
            }
            sink.emit(
                Event::warn(events::KEEPING_LAST_DUPLICATE)
                    .with("duplicates", json!(keys))
                    .with("dropped_rows", keep.iter().filter(|k| !**k).count()),
            );
        }
        DuplicatePolicy::DropAll => {
            for (_, rows) in &duplicates {
                for &row in rows {
                    keep[row] = false;
                }
            }
            sink.emit(
                Event::new(Level::Error, events::REMOVING_DUPLICATES)
                    .with("duplicates", json!(keys))
                    .with("dropped_rows", keep.iter().filter(|k| !**k).count()),
            );
        }
    }
    Ok(table.filter_rows(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::CaptureSink,
        table::{int, text},
    };

    fn with_duplicates() -> Table {
        Table::from_literals(
            &["fips", "date", "cases"],
            vec![
                vec![text("06"), text("2020-04-01"), int(1)],
                vec![text("06"), text("2020-04-01"), int(2)],
                vec![text("36"), text("2020-04-01"), int(3)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn keep_last_retains_latest_vintage() {
        let mut sink = CaptureSink::new();
        let out = resolve_duplicate_keys(with_duplicates(), DuplicatePolicy::KeepLast, &mut sink)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.cell(0, "cases"), Some(&int(2)));
        assert_eq!(sink.messages(), vec![events::KEEPING_LAST_DUPLICATE]);
    }

    #[test]
    fn drop_all_removes_every_copy() {
        let mut sink = CaptureSink::new();
        let out = resolve_duplicate_keys(with_duplicates(), DuplicatePolicy::DropAll, &mut sink)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.cell(0, "fips"), Some(&text("36")));
        assert_eq!(sink.events[0].level, Level::Error);
        assert_eq!(sink.events[0].field("duplicates"), Some(&json!(["06,2020-04-01"])));
    }

    #[test]
    fn fail_policy_reports_keys() {
        let mut sink = CaptureSink::new();
        let err = resolve_duplicate_keys(with_duplicates(), DuplicatePolicy::Fail, &mut sink)
            .unwrap_err();
        let dup = err.downcast_ref::<DuplicateKeysError>().unwrap();
        assert_eq!(dup.keys, vec!["06,2020-04-01".to_string()]);
        assert!(sink.is_empty());
    }

    #[test]
    fn unique_keys_pass_through_silently() {
        let table = with_duplicates().filter_rows(&[true, false, true]);
        let mut sink = CaptureSink::new();
        let out = resolve_duplicate_keys(table, DuplicatePolicy::Fail, &mut sink).unwrap();
        assert_eq!(out.len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn only_common_columns_drops_extras_with_warning() {
        let table = Table::from_literals(
            &["fips", "zeta", "cases", "alpha"],
            vec![vec![text("06"), int(1), int(2), int(3)]],
        )
        .unwrap();
        let mut sink = CaptureSink::new();
        let out = only_common_columns(table, &mut sink);
        assert_eq!(out.column_names(), ["fips", "cases"]);
        assert_eq!(
            sink.events[0].field("extra_columns"),
            Some(&json!(["alpha", "zeta"]))
        );
    }
}
