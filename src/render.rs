//! Aligned plain-text rendering for terminal listings and log attributes.

use itertools::Itertools;

use crate::{data::format_cell, table::Table};

/// Lays out `headers` and `rows` in left-aligned columns separated by two
/// spaces, with a dashed rule under the header. Line breaks and tabs inside
/// a cell become spaces so each row stays on one line.
pub fn render_rows(headers: &[String], rows: &[Vec<String>]) -> String {
    let lines = std::iter::once(headers.iter().map(|h| one_line(h)).collect::<Vec<_>>())
        .chain(rows.iter().map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(|c| one_line(c)).unwrap_or_default())
                .collect()
        }))
        .collect::<Vec<_>>();
    let widths = (0..headers.len())
        .map(|idx| {
            lines
                .iter()
                .map(|line| line[idx].chars().count())
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect::<Vec<_>>();

    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let mut output = String::new();
    for (pos, line) in lines.iter().enumerate() {
        output.push_str(&pad_line(line, &widths));
        output.push('\n');
        if pos == 0 {
            output.push_str(&pad_line(&rule, &widths));
            output.push('\n');
        }
    }
    output
}

/// Renders a table with its index columns first, cells formatted as in CSV output.
pub fn render_table(table: &Table, limit: Option<usize>) -> String {
    let rows = table
        .rows()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|row| row.iter().map(format_cell).collect::<Vec<String>>())
        .collect::<Vec<_>>();
    render_rows(&table.all_column_names(), &rows)
}

pub fn print_rows(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_rows(headers, rows));
}

fn pad_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .join("  ")
        .trim_end()
        .to_string()
}

fn one_line(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
