//! FIPS and state reference data used to attach region names to rows.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    data::{Cell, Value},
    events::{self, Event, EventSink},
    fields::{AGGREGATE_LEVEL, COUNTRY, COUNTY, FIPS, STATE, STATE_FULL_NAME},
    io_utils,
    table::{Table, text},
};

pub const COUNTRY_USA: &str = "USA";
pub const LEVEL_STATE: &str = "state";
pub const LEVEL_COUNTY: &str = "county";

/// Formats a numeric region code as FIPS: two digits for states (codes
/// below 100), five digits otherwise.
pub fn format_fips(value: &Value) -> Option<String> {
    let code = match value {
        Value::Integer(i) => *i,
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Float(_) | Value::Date(_) => return None,
    };
    if code < 0 {
        return None;
    }
    Some(if code < 100 {
        format!("{code:02}")
    } else {
        format!("{code:05}")
    })
}

/// Adds or replaces the `fips` column from the numeric codes in `source`.
/// Codes that cannot be formatted become missing.
pub fn derive_fips(table: Table, source: &str) -> Result<Table> {
    let values = table
        .column(source)?
        .into_iter()
        .map(|cell| cell.as_ref().and_then(format_fips).map(Value::String))
        .collect::<Vec<Cell>>();
    Ok(table.set_column(FIPS.name(), values)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountyRecord {
    pub fips: String,
    pub state: String,
    pub county: String,
}

/// Counties keyed by five digit FIPS.
#[derive(Debug, Clone, Default)]
pub struct CountyReference {
    by_fips: HashMap<String, CountyRecord>,
}

impl CountyReference {
    /// Loads a county CSV with at least `fips,state,county` columns. FIPS
    /// read as numbers lose their leading zero, so they are padded back.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, b',', true)?;
        let mut by_fips = HashMap::new();
        for (idx, record) in reader.deserialize::<CountyRecord>().enumerate() {
            let mut record =
                record.with_context(|| format!("Reading row {} in {:?}", idx + 2, path))?;
            record.fips = format!("{:0>5}", record.fips.trim());
            by_fips.insert(record.fips.clone(), record);
        }
        debug!("Loaded {} county record(s) from {:?}", by_fips.len(), path);
        Ok(Self { by_fips })
    }

    pub fn from_records(records: Vec<CountyRecord>) -> Self {
        Self {
            by_fips: records.into_iter().map(|r| (r.fips.clone(), r)).collect(),
        }
    }

    pub fn get(&self, fips: &str) -> Option<&CountyRecord> {
        self.by_fips.get(fips)
    }

    pub fn len(&self) -> usize {
        self.by_fips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fips.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "STATE")]
    pub fips: String,
    #[serde(rename = "STUSAB")]
    pub state: String,
    #[serde(rename = "STATE_NAME")]
    pub name: String,
}

/// States keyed by two digit FIPS, read from the census `state.txt` file.
#[derive(Debug, Clone, Default)]
pub struct StateReference {
    by_fips: HashMap<String, StateRecord>,
    /// Full state name to FIPS.
    by_name: HashMap<String, String>,
}

impl StateReference {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, b'|', true)?;
        let mut by_fips = HashMap::new();
        for (idx, record) in reader.deserialize::<StateRecord>().enumerate() {
            let mut record =
                record.with_context(|| format!("Reading row {} in {:?}", idx + 2, path))?;
            record.fips = format!("{:0>2}", record.fips.trim());
            by_fips.insert(record.fips.clone(), record);
        }
        debug!("Loaded {} state record(s) from {:?}", by_fips.len(), path);
        Ok(Self::from_map(by_fips))
    }

    pub fn from_records(records: Vec<StateRecord>) -> Self {
        Self::from_map(records.into_iter().map(|r| (r.fips.clone(), r)).collect())
    }

    fn from_map(by_fips: HashMap<String, StateRecord>) -> Self {
        let by_name = by_fips
            .values()
            .map(|r| (r.name.clone(), r.fips.clone()))
            .collect();
        Self { by_fips, by_name }
    }

    pub fn get(&self, fips: &str) -> Option<&StateRecord> {
        self.by_fips.get(fips)
    }

    /// Looks a state up by its full census name, e.g. `New York`.
    pub fn get_by_name(&self, name: &str) -> Option<&StateRecord> {
        self.by_name.get(name).and_then(|fips| self.by_fips.get(fips))
    }

    pub fn len(&self) -> usize {
        self.by_fips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fips.is_empty()
    }
}

/// How a source's rows are matched to reference regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionLookup {
    /// State rows by two digit FIPS, county rows by five digit FIPS.
    #[default]
    ByFips,
    /// `state` from the full name in `state_full_name`; FIPS only decides the level.
    ByStateName,
}

/// A county FIPS is exactly five digits.
pub const COUNTY_FIPS_PATTERN: &str = r"\A\d{5}\z";
/// A state FIPS is exactly two digits.
pub const STATE_FIPS_PATTERN: &str = r"\A\d{2}\z";

/// Sets `state`, `county`, `aggregate_level` and `country` from the
/// reference data. State rows (two digit FIPS) only get a state; county rows
/// whose FIPS is not in `counties` are reported and dropped.
pub fn annotate_regions(
    table: Table,
    counties: &CountyReference,
    states: &StateReference,
    sink: &mut dyn EventSink,
) -> Result<Table> {
    let table = if table.has_index() {
        table.reset_index()?
    } else {
        table
    };
    let county_pattern =
        Regex::new(COUNTY_FIPS_PATTERN).context("Compiling county FIPS pattern")?;
    let fips_values = table.column(FIPS.name())?;
    let existing_county = table.position(COUNTY.name());

    let mut state_col = Vec::with_capacity(table.len());
    let mut county_col = Vec::with_capacity(table.len());
    let mut level_col = Vec::with_capacity(table.len());
    let mut keep = Vec::with_capacity(table.len());
    let mut bad_fips: Vec<String> = Vec::new();

    for (row, fips_cell) in fips_values.into_iter().enumerate() {
        let fips = fips_cell.as_ref().and_then(Value::as_str).unwrap_or("");
        let current_county = existing_county.and_then(|pos| table.rows()[row][pos].clone());
        if fips.is_empty() {
            // Left for the null-row filter to report.
            state_col.push(None);
            county_col.push(current_county);
            level_col.push(None);
            keep.push(true);
        } else if fips.len() == 2 {
            state_col.push(states.get(fips).and_then(|s| text(&s.state)));
            county_col.push(current_county);
            level_col.push(text(LEVEL_STATE));
            keep.push(true);
        } else if let Some(record) = county_pattern
            .is_match(fips)
            .then(|| counties.get(fips))
            .flatten()
        {
            state_col.push(text(&record.state));
            county_col.push(text(&record.county));
            level_col.push(text(LEVEL_COUNTY));
            keep.push(true);
        } else {
            if !bad_fips.iter().any(|b| b == fips) {
                bad_fips.push(fips.to_string());
            }
            state_col.push(None);
            county_col.push(current_county);
            level_col.push(None);
            keep.push(false);
        }
    }

    if !bad_fips.is_empty() {
        sink.emit(Event::warn(events::UNMATCHED_COUNTIES).with("bad_fips", json!(bad_fips)));
    }

    let table = table
        .set_column(STATE.name(), state_col)?
        .set_column(COUNTY.name(), county_col)?
        .set_column(AGGREGATE_LEVEL.name(), level_col)?
        .fill_column(COUNTRY.name(), text(COUNTRY_USA))?;
    Ok(table.filter_rows(&keep))
}

/// Sets `state` from the census abbreviation matching each row's
/// `state_full_name`, plus `aggregate_level` from the FIPS length and
/// `country`. Names the census file does not know leave `state` missing.
pub fn annotate_by_state_name(table: Table, states: &StateReference) -> Result<Table> {
    let table = if table.has_index() {
        table.reset_index()?
    } else {
        table
    };
    let state_col = table
        .column(STATE_FULL_NAME.name())?
        .into_iter()
        .map(|cell| {
            cell.as_ref()
                .and_then(Value::as_str)
                .and_then(|name| states.get_by_name(name))
                .and_then(|record| text(&record.state))
        })
        .collect::<Vec<_>>();
    let level_col = table
        .column(FIPS.name())?
        .into_iter()
        .map(|cell| match cell.as_ref().and_then(Value::as_str).map(str::len) {
            Some(2) => text(LEVEL_STATE),
            Some(5) => text(LEVEL_COUNTY),
            _ => None,
        })
        .collect::<Vec<_>>();
    Ok(table
        .set_column(STATE.name(), state_col)?
        .set_column(AGGREGATE_LEVEL.name(), level_col)?
        .fill_column(COUNTRY.name(), text(COUNTRY_USA))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::CaptureSink, table::int};

    fn counties() -> CountyReference {
        CountyReference::from_records(vec![CountyRecord {
            fips: "06075".into(),
            state: "CA".into(),
            county: "San Francisco County".into(),
        }])
    }

    fn states() -> StateReference {
        StateReference::from_records(vec![StateRecord {
            fips: "06".into(),
            state: "CA".into(),
            name: "California".into(),
        }])
    }

    #[test]
    fn format_fips_pads_by_region_level() {
        assert_eq!(format_fips(&Value::Integer(6)), Some("06".into()));
        assert_eq!(format_fips(&Value::Integer(6075)), Some("06075".into()));
        assert_eq!(format_fips(&Value::Float(21.0)), Some("21".into()));
        assert_eq!(format_fips(&Value::String("48347".into())), Some("48347".into()));
        assert_eq!(format_fips(&Value::Float(1.5)), None);
    }

    #[test]
    fn annotate_regions_sets_names_and_drops_unknown_counties() {
        let table = Table::from_literals(
            &["fips", "cases"],
            vec![
                vec![text("06075"), int(1)],
                vec![text("06"), int(2)],
                vec![text("31337"), int(3)],
                vec![text("31337"), int(4)],
            ],
        )
        .unwrap();
        let mut sink = CaptureSink::new();
        let out = annotate_regions(table, &counties(), &states(), &mut sink).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.cell(0, "county"), Some(&text("San Francisco County")));
        assert_eq!(out.cell(1, "aggregate_level"), Some(&text("state")));
        assert_eq!(out.cell(1, "state"), Some(&text("CA")));
        assert_eq!(out.cell(1, "country"), Some(&text("USA")));
        assert_eq!(sink.messages(), vec![events::UNMATCHED_COUNTIES]);
        assert_eq!(sink.events[0].field("bad_fips"), Some(&json!(["31337"])));
    }

    #[test]
    fn state_names_resolve_to_abbreviations() {
        let table = Table::from_literals(
            &["fips", "state_full_name"],
            vec![
                vec![text("06045"), text("California")],
                vec![text("06"), text("California")],
                vec![text("78010"), text("Atlantis")],
            ],
        )
        .unwrap();
        let out = annotate_by_state_name(table, &states()).unwrap();
        assert_eq!(out.cell(0, "state"), Some(&text("CA")));
        assert_eq!(out.cell(0, "aggregate_level"), Some(&text("county")));
        assert_eq!(out.cell(1, "aggregate_level"), Some(&text("state")));
        assert_eq!(out.cell(2, "state"), Some(&None));
        assert_eq!(out.cell(2, "country"), Some(&text("USA")));
    }

    #[test]
    fn unknown_state_keeps_row_with_missing_state() {
        let table = Table::from_literals(&["fips"], vec![vec![text("99")]]).unwrap();
        let mut sink = CaptureSink::new();
        let out = annotate_regions(table, &counties(), &states(), &mut sink).unwrap();
        assert_eq!(out.cell(0, "state"), Some(&None));
        assert!(sink.is_empty());
    }
}
