//! In-memory table with an optional multi-column index.
//!
//! Index columns are stored ahead of the regular columns in every row, the way
//! a CSV with index columns reads left to right. Transformations take the
//! table by value and hand back a new one.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

use crate::{
    data::{Cell, Value, compare_cells},
    error::TableError,
};

/// Name given to the positional column produced by resetting a table with no index.
pub const POSITIONAL_INDEX: &str = "index";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    index: Vec<String>,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        ensure_unique(&columns)?;
        Ok(Self {
            index: Vec::new(),
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Convenience constructor from string literals, used heavily by tests.
    pub fn from_literals(columns: &[&str], rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        Self::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        let expected = self.width();
        if row.len() != expected {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected,
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn index_names(&self) -> &[String] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Index names followed by column names, in row order.
    pub fn all_column_names(&self) -> Vec<String> {
        self.index.iter().chain(self.columns.iter()).cloned().collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_index(&self) -> bool {
        !self.index.is_empty()
    }

    fn width(&self) -> usize {
        self.index.len() + self.columns.len()
    }

    /// Position of `name` within a row, searching index columns first.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index
            .iter()
            .chain(self.columns.iter())
            .position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn require(&self, name: &str) -> Result<usize, TableError> {
        self.position(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Cell>, TableError> {
        let pos = self.require(name)?;
        Ok(self.rows.iter().map(|row| &row[pos]).collect())
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let pos = self.position(name)?;
        self.rows.get(row).map(|r| &r[pos])
    }

    /// The index cells of row `row`.
    pub fn key(&self, row: usize) -> &[Cell] {
        &self.rows[row][..self.index.len()]
    }

    /// Moves the index back into regular columns. A table without an index
    /// gains a positional `index` column, the artifact later normalization drops.
    pub fn reset_index(self) -> Result<Self, TableError> {
        if self.index.is_empty() {
            if self.columns.iter().any(|c| c == POSITIONAL_INDEX) {
                return Err(TableError::DuplicateColumn(POSITIONAL_INDEX.to_string()));
            }
            let mut columns = Vec::with_capacity(self.columns.len() + 1);
            columns.push(POSITIONAL_INDEX.to_string());
            columns.extend(self.columns);
            let rows = self
                .rows
                .into_iter()
                .enumerate()
                .map(|(pos, row)| {
                    let mut out = Vec::with_capacity(row.len() + 1);
                    out.push(Some(Value::Integer(pos as i64)));
                    out.extend(row);
                    out
                })
                .collect();
            return Ok(Self {
                index: Vec::new(),
                columns,
                rows,
            });
        }
        let mut columns = self.index;
        columns.extend(self.columns);
        ensure_unique(&columns)?;
        Ok(Self {
            index: Vec::new(),
            columns,
            rows: self.rows,
        })
    }

    /// Makes `keys` the index. A non-empty existing index is returned to the
    /// regular columns first so no data is discarded.
    pub fn set_index<S: AsRef<str>>(self, keys: &[S]) -> Result<Self, TableError> {
        let table = if self.index.is_empty() {
            self
        } else {
            self.reset_index()?
        };
        let keys = keys.iter().map(|k| k.as_ref().to_string()).collect::<Vec<_>>();
        ensure_unique(&keys)?;
        let key_positions = keys
            .iter()
            .map(|k| table.require(k))
            .collect::<Result<Vec<_>, _>>()?;
        let rest = (0..table.columns.len())
            .filter(|pos| !key_positions.contains(pos))
            .collect::<Vec<_>>();
        let order = key_positions.iter().chain(rest.iter()).copied().collect::<Vec<_>>();
        let columns = rest.iter().map(|&pos| table.columns[pos].clone()).collect();
        let rows = table
            .rows
            .into_iter()
            .map(|row| permute(row, &order))
            .collect();
        Ok(Self {
            index: keys,
            columns,
            rows,
        })
    }

    /// Stable ascending sort on the index cells.
    pub fn sort_by_index(mut self) -> Self {
        let width = self.index.len();
        if width > 0 {
            self.rows.sort_by(|a, b| {
                a[..width]
                    .iter()
                    .zip(b[..width].iter())
                    .map(|(l, r)| compare_cells(l, r))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        self
    }

    /// Keeps the index and the listed columns, in the listed order.
    pub fn select<S: AsRef<str>>(self, names: &[S]) -> Result<Self, TableError> {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect::<Vec<_>>();
        ensure_unique(&names)?;
        let index_width = self.index.len();
        let mut order = (0..index_width).collect::<Vec<_>>();
        for name in &names {
            let pos = self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| TableError::MissingColumn(name.clone()))?;
            order.push(index_width + pos);
        }
        let rows = self
            .rows
            .into_iter()
            .map(|row| permute(row, &order))
            .collect();
        Ok(Self {
            index: self.index,
            columns: names,
            rows,
        })
    }

    pub fn drop_columns<S: AsRef<str>>(self, names: &[S]) -> Self {
        let drop = names.iter().map(|n| n.as_ref()).collect::<HashSet<_>>();
        let keep = self
            .columns
            .iter()
            .filter(|c| !drop.contains(c.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        // Every kept name comes from the existing column list.
        self.select(&keep).unwrap_or_default()
    }

    /// Renames regular and index columns; names absent from `renames` are kept.
    pub fn rename(mut self, renames: &BTreeMap<String, String>) -> Result<Self, TableError> {
        for name in self.index.iter_mut().chain(self.columns.iter_mut()) {
            if let Some(new_name) = renames.get(name.as_str()) {
                *name = new_name.clone();
            }
        }
        ensure_unique(&self.all_column_names())?;
        Ok(self)
    }

    /// Adds `name` as the last column, or replaces its cells when it exists.
    pub fn set_column(mut self, name: &str, values: Vec<Cell>) -> Result<Self, TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        match self.position(name) {
            Some(pos) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[pos] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(self)
    }

    /// Sets every cell of `name` to `value`, adding the column when needed.
    pub fn fill_column(self, name: &str, value: Cell) -> Result<Self, TableError> {
        let values = vec![value; self.rows.len()];
        self.set_column(name, values)
    }

    /// Applies `f` to every cell, index cells included.
    pub fn map_cells<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(Cell) -> Cell,
    {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                *cell = f(cell.take());
            }
        }
        self
    }

    /// Keeps rows whose `mask` entry is true.
    pub fn filter_rows(mut self, mask: &[bool]) -> Self {
        let mut keep = mask.iter();
        self.rows.retain(|_| keep.next().copied().unwrap_or(false));
        self
    }

    /// Stacks tables with matching index names; the column set is the union
    /// in first-seen order and absent cells are missing.
    pub fn concat(tables: Vec<Table>) -> Result<Self, TableError> {
        let mut iter = tables.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Self::default());
        };
        let rest = iter.collect::<Vec<_>>();
        let index = first.index.clone();
        let mut columns = first.columns.clone();
        for table in &rest {
            if table.index != index {
                let missing = index
                    .iter()
                    .chain(table.index.iter())
                    .find(|name| !(index.contains(name) && table.index.contains(name)))
                    .cloned()
                    .unwrap_or_default();
                return Err(TableError::MissingColumn(missing));
            }
            for name in &table.columns {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        let mut out = Self {
            index,
            columns,
            rows: Vec::new(),
        };
        for table in std::iter::once(first).chain(rest) {
            let order = out
                .all_column_names()
                .iter()
                .map(|name| table.position(name))
                .collect::<Vec<_>>();
            for row in table.rows {
                let mut cells = row.into_iter().map(Some).collect::<Vec<_>>();
                let merged = order
                    .iter()
                    .map(|pos| pos.and_then(|p| cells[p].take()).flatten())
                    .collect();
                out.rows.push(merged);
            }
        }
        Ok(out)
    }
}

fn permute(row: Vec<Cell>, order: &[usize]) -> Vec<Cell> {
    let mut cells = row.into_iter().map(Some).collect::<Vec<_>>();
    order
        .iter()
        .map(|&pos| cells[pos].take().flatten())
        .collect()
}

fn ensure_unique(names: &[String]) -> Result<(), TableError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(TableError::DuplicateColumn(name.clone()));
        }
    }
    Ok(())
}

/// Builds a text cell; empty strings are kept as text.
pub fn text(value: &str) -> Cell {
    Some(Value::String(value.to_string()))
}

pub fn int(value: i64) -> Cell {
    Some(Value::Integer(value))
}
