use std::{collections::HashSet, io::Read, path::Path};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use log::info;
use regex::Regex;

use crate::{
    cli::VerifyArgs,
    fields::{self, TIMESERIES_KEYS},
    io_utils,
    reference::{COUNTY_FIPS_PATTERN, STATE_FIPS_PATTERN},
};

pub fn execute(args: &VerifyArgs) -> Result<()> {
    for input in &args.inputs {
        let rows = verify_file(input, args.strict)?;
        info!("✓ {:?} is canonical ({} row(s))", input, rows);
    }
    Ok(())
}

pub fn verify_file(path: &Path, strict: bool) -> Result<usize> {
    let reader = io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER, true)?;
    verify_canonical(reader, strict).with_context(|| format!("Verifying {path:?}"))
}

/// Checks header order, FIPS shape, dates and key order/uniqueness. Returns
/// the number of data rows.
pub fn verify_canonical<R: Read>(mut reader: csv::Reader<R>, strict: bool) -> Result<usize> {
    let headers = io_utils::reader_headers(&mut reader, encoding_rs::UTF_8)?;
    verify_headers(&headers, strict)?;

    let fips_pattern = Regex::new(&format!("{COUNTY_FIPS_PATTERN}|{STATE_FIPS_PATTERN}"))
        .context("Compiling FIPS pattern")?;
    let mut seen = HashSet::new();
    let mut previous: Option<(String, NaiveDate)> = None;
    let mut rows = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.with_context(|| format!("Reading row {line}"))?;
        let fips = record.get(0).unwrap_or("");
        let date = record.get(1).unwrap_or("");
        if !fips_pattern.is_match(fips) {
            bail!("Row {line}: '{fips}' is not a two or five digit FIPS");
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Row {line}: '{date}' is not a YYYY-MM-DD date"))?;
        let key = (fips.to_string(), date);
        if !seen.insert(key.clone()) {
            bail!("Row {line}: duplicate key {fips},{date}");
        }
        if previous.as_ref().is_some_and(|prev| *prev > key) {
            bail!("Row {line}: key {fips},{date} is out of order");
        }
        previous = Some(key);
        rows += 1;
    }
    Ok(rows)
}

pub fn verify_headers(headers: &[String], strict: bool) -> Result<()> {
    let keys = fields::timeseries_key_names();
    if headers.len() < keys.len() || headers[..keys.len()] != keys[..] {
        bail!(
            "Header must start with {}, found {}",
            keys.join(","),
            headers.join(",")
        );
    }
    let rest = &headers[TIMESERIES_KEYS.len()..];
    let expected = fields::sort_column_names(rest);
    if expected != rest {
        bail!(
            "Columns are not in field order; expected {}",
            expected.join(",")
        );
    }
    if strict {
        let extra = rest
            .iter()
            .filter(|name| fields::lookup(name).is_none())
            .cloned()
            .collect::<Vec<_>>();
        if !extra.is_empty() {
            bail!("Columns are not canonical fields: {}", extra.join(","));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify(data: &str, strict: bool) -> Result<usize> {
        verify_canonical(io_utils::open_csv_reader(data.as_bytes(), b',', true), strict)
    }

    #[test]
    fn accepts_canonical_file() {
        let data = "fips,date,cases,extra\n06,2020-04-01,1,\n06045,2020-04-01,2,x\n";
        assert_eq!(verify(data, false).unwrap(), 2);
        assert!(verify(data, true).is_err());
    }

    #[test]
    fn rejects_misordered_columns() {
        assert!(verify("fips,date,deaths,cases\n", false).is_err());
        assert!(verify("date,fips,cases\n", false).is_err());
    }

    #[test]
    fn rejects_duplicate_and_unsorted_keys() {
        assert!(verify("fips,date\n06,2020-04-01\n06,2020-04-01\n", false).is_err());
        assert!(verify("fips,date\n36,2020-04-01\n06,2020-04-01\n", false).is_err());
    }

    #[test]
    fn rejects_bad_fips_and_dates() {
        assert!(verify("fips,date\n6045,2020-04-01\n", false).is_err());
        assert!(verify("fips,date\n06045,04/01/2020\n", false).is_err());
    }
}
