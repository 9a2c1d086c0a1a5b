//! Reading and writing tables in the canonical CSV layout.
//!
//! Written files always lead with the `fips,date` index columns, carry dates
//! as `YYYY-MM-DD` and render numbers through [`format_cell`], so a file read
//! back with [`read_csv`] and written again is byte-identical.

use std::{
    collections::HashSet,
    io::{Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{Level, debug};
use serde_json::json;

use crate::{
    data::{Cell, Value, format_cell, parse_cell, parse_exact_cell, parse_naive_date, parse_text_cell},
    events::{self, Event, EventSink},
    fields::{self, DATE_FIELDS, TEXT_FIELDS},
    index::fix_index,
    io_utils,
    table::Table,
};

/// Normalizes the index of `table` and writes it to `writer`.
pub fn write_table<W: Write>(
    table: Table,
    writer: &mut csv::Writer<W>,
    sink: &mut dyn EventSink,
) -> Result<()> {
    let table = fix_index(table, sink)?;
    sink.emit(
        Event::new(Level::Info, events::WRITING_TABLE)
            .with("current_index", json!(table.index_names())),
    );
    writer
        .write_record(table.all_column_names())
        .context("Writing header row")?;
    for (idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(format_cell))
            .with_context(|| format!("Writing row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output")?;
    debug!("Wrote {} row(s)", table.len());
    Ok(())
}

/// Writes `table` to `path` (or stdout for `-`) as a canonical CSV.
pub fn write_csv(table: Table, path: &Path, sink: &mut dyn EventSink) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    write_table(table, &mut writer, sink).with_context(|| format!("Writing {path:?}"))
}

/// Renders `table` as canonical CSV text.
pub fn write_csv_string(table: Table, sink: &mut dyn EventSink) -> Result<String> {
    let mut writer = io_utils::csv_writer(Vec::new(), io_utils::DEFAULT_CSV_DELIMITER);
    write_table(table, &mut writer, sink)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Finishing CSV output: {}", err.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Reads a canonical CSV with the index set to (fips, date).
pub fn read_csv(path: &Path) -> Result<Table> {
    let reader = io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER, true)?;
    read_canonical(reader).with_context(|| format!("Reading canonical CSV {path:?}"))
}

pub fn read_canonical<R: Read>(mut reader: csv::Reader<R>) -> Result<Table> {
    let headers = io_utils::reader_headers(&mut reader, encoding_rs::UTF_8)?;
    let kinds = headers
        .iter()
        .map(|name| match fields::lookup(name) {
            Some(field) if DATE_FIELDS.contains(&field) => CellKind::Date,
            Some(field) if TEXT_FIELDS.contains(&field) => CellKind::Text,
            _ => CellKind::Exact,
        })
        .collect::<Vec<_>>();
    let mut table = Table::new(headers)?;
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let row = record
            .iter()
            .zip(&kinds)
            .map(|(raw, kind)| kind.parse(raw))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Parsing row {}", idx + 2))?;
        table.push_row(row)?;
    }
    Ok(table.set_index(&fields::timeseries_key_names())?)
}

/// Reads a raw source file. Cells are inferred as numbers unless their
/// column is listed in `text_columns`.
pub fn read_source_csv(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    text_columns: &[String],
) -> Result<Table> {
    let reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    read_source(reader, encoding, text_columns)
        .with_context(|| format!("Reading source CSV {path:?}"))
}

pub fn read_source<R: Read>(
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
    text_columns: &[String],
) -> Result<Table> {
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let text = text_columns.iter().map(String::as_str).collect::<HashSet<_>>();
    let kinds = headers
        .iter()
        .map(|name| {
            if text.contains(name.as_str()) {
                CellKind::Text
            } else {
                CellKind::Inferred
            }
        })
        .collect::<Vec<_>>();
    let mut table = Table::new(headers)?;
    let mut record = csv::ByteRecord::new();
    let mut line = 1usize;
    while reader.read_byte_record(&mut record)? {
        line += 1;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {line}"))?;
        let row = decoded
            .iter()
            .zip(&kinds)
            .map(|(raw, kind)| kind.parse(raw))
            .collect::<Result<Vec<_>>>()?;
        table.push_row(row)?;
    }
    debug!("Read {} source row(s)", table.len());
    Ok(table)
}

#[derive(Debug, Clone, Copy)]
enum CellKind {
    Text,
    Date,
    Inferred,
    Exact,
}

impl CellKind {
    fn parse(self, raw: &str) -> Result<Cell> {
        Ok(match self {
            CellKind::Text => parse_text_cell(raw),
            CellKind::Inferred => parse_cell(raw),
            CellKind::Exact => parse_exact_cell(raw),
            CellKind::Date if raw.is_empty() => None,
            CellKind::Date => Some(Value::Date(parse_naive_date(raw)?)),
        })
    }
}
