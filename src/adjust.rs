//! Corrections for known problems in individual upstream datasets.
//!
//! Each [`MappingConfig`](crate::mapping::MappingConfig) carries an
//! [`Adjustments`] block. Replacements and assignments run on the renamed
//! table before regions are looked up; the null rules run after rows
//! without a key have been dropped.

use anyhow::Result;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, Value, format_cell},
    fields::{DATE, FIPS},
    table::{Table, text},
};

/// Rewrites cells of `column` equal to `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub column: String,
    pub from: String,
    pub to: String,
}

/// Sets `column` to `value` on every row where `when_column` equals `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub when_column: String,
    pub equals: String,
    pub column: String,
    pub value: String,
}

/// Clears `column` for one region between two dates, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullRange {
    pub column: String,
    pub fips: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub replace: Vec<Replacement>,
    pub assign: Vec<Assignment>,
    /// Columns cleared on state rows (two digit FIPS).
    pub state_level_nulls: Vec<String>,
    pub null_ranges: Vec<NullRange>,
}

impl Adjustments {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty()
            && self.assign.is_empty()
            && self.state_level_nulls.is_empty()
            && self.null_ranges.is_empty()
    }
}

fn cell_equals(cell: &Cell, expected: &str) -> bool {
    cell.is_some() && format_cell(cell) == expected
}

/// Applies `replacements` in order. Columns missing from the table are skipped.
pub fn apply_replacements(mut table: Table, replacements: &[Replacement]) -> Result<Table> {
    for rule in replacements {
        let Ok(cells) = table.column(&rule.column) else {
            continue;
        };
        let mut changed = 0usize;
        let values = cells
            .into_iter()
            .map(|cell| {
                if cell_equals(cell, &rule.from) {
                    changed += 1;
                    text(&rule.to)
                } else {
                    cell.clone()
                }
            })
            .collect::<Vec<_>>();
        debug!(
            "Replaced '{}' with '{}' in {} {} cell(s)",
            rule.from, rule.to, changed, rule.column
        );
        table = table.set_column(&rule.column, values)?;
    }
    Ok(table)
}

/// Applies `assignments` in order, so a later rule sees the cells an earlier
/// one wrote. A rule whose condition column is absent does nothing.
pub fn apply_assignments(mut table: Table, assignments: &[Assignment]) -> Result<Table> {
    for rule in assignments {
        let Ok(conditions) = table.column(&rule.when_column) else {
            continue;
        };
        let hits = conditions
            .into_iter()
            .map(|cell| cell_equals(cell, &rule.equals))
            .collect::<Vec<_>>();
        if !hits.iter().any(|hit| *hit) {
            continue;
        }
        let current = match table.column(&rule.column) {
            Ok(cells) => cells.into_iter().cloned().collect::<Vec<_>>(),
            Err(_) => vec![None; table.len()],
        };
        let values = current
            .into_iter()
            .zip(&hits)
            .map(|(cell, hit)| if *hit { text(&rule.value) } else { cell })
            .collect::<Vec<_>>();
        debug!(
            "Set {} to '{}' where {} is '{}'",
            rule.column, rule.value, rule.when_column, rule.equals
        );
        table = table.set_column(&rule.column, values)?;
    }
    Ok(table)
}

/// Clears the cells of `rows` (a row mask) in each of `columns` present in the table.
fn clear_cells<S: AsRef<str>>(mut table: Table, columns: &[S], rows: &[bool]) -> Result<Table> {
    for column in columns {
        let Ok(cells) = table.column(column.as_ref()) else {
            continue;
        };
        let values = cells
            .into_iter()
            .zip(rows)
            .map(|(cell, clear)| if *clear { None } else { cell.clone() })
            .collect::<Vec<_>>();
        table = table.set_column(column.as_ref(), values)?;
    }
    Ok(table)
}

fn fips_of(cell: &Cell) -> &str {
    cell.as_ref().and_then(Value::as_str).unwrap_or("")
}

/// Clears `columns` on state rows, leaving county rows untouched.
pub fn null_state_level<S: AsRef<str>>(table: Table, columns: &[S]) -> Result<Table> {
    if columns.is_empty() {
        return Ok(table);
    }
    let state_rows = table
        .column(FIPS.name())?
        .into_iter()
        .map(|cell| fips_of(cell).len() == 2)
        .collect::<Vec<_>>();
    clear_cells(table, columns, &state_rows)
}

/// Clears each range's column for rows of its region dated within the range.
pub fn null_ranges(mut table: Table, ranges: &[NullRange]) -> Result<Table> {
    for range in ranges {
        let fips = table.column(FIPS.name())?;
        let dates = table.column(DATE.name())?;
        let rows = fips
            .into_iter()
            .zip(dates)
            .map(|(fips, date)| {
                fips_of(fips) == range.fips
                    && matches!(date, Some(Value::Date(d)) if (range.start..=range.end).contains(d))
            })
            .collect::<Vec<_>>();
        debug!(
            "Clearing {} for {} on {} row(s) from {} to {}",
            range.column,
            range.fips,
            rows.iter().filter(|r| **r).count(),
            range.start,
            range.end
        );
        table = clear_cells(table, &[range.column.as_str()], &rows)?;
    }
    Ok(table)
}
