//! The closed registry of canonical field names shared with downstream models.
//!
//! Output column order is the declaration order of [`FIELDS`]. Columns that
//! are not in the registry sort after every registry field, alphabetically,
//! so extra columns stay deterministic instead of being silently dropped.

use std::{cmp::Ordering, collections::HashMap, fmt, sync::OnceLock};

use itertools::Itertools;

/// A canonical field name and its position in the output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    name: &'static str,
    position: usize,
}

impl Field {
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! registry {
    ($($ident:ident = $name:literal),+ $(,)?) => {
        registry!(@consts 0usize; $($ident = $name),+);

        /// Every canonical field, in output order.
        pub const FIELDS: &[Field] = &[$($ident),+];
    };
    (@consts $pos:expr; $ident:ident = $name:literal $(, $rest:ident = $rest_name:literal)*) => {
        pub const $ident: Field = Field { name: $name, position: $pos };
        registry!(@consts $pos + 1usize; $($rest = $rest_name),*);
    };
    (@consts $pos:expr;) => {};
}

registry! {
    FIPS = "fips",
    DATE = "date",
    // 2 letter state abbreviation, i.e. MA
    STATE = "state",
    COUNTRY = "country",
    COUNTY = "county",
    AGGREGATE_LEVEL = "aggregate_level",
    // Full state name, i.e. Massachusetts
    STATE_FULL_NAME = "state_full_name",
    CASES = "cases",
    DEATHS = "deaths",
    RECOVERED = "recovered",
    CUMULATIVE_HOSPITALIZED = "cumulative_hospitalized",
    CUMULATIVE_ICU = "cumulative_icu",
    POSITIVE_TESTS = "positive_tests",
    NEGATIVE_TESTS = "negative_tests",
    TOTAL_TESTS = "total_tests",
    CURRENT_ICU = "current_icu",
    CURRENT_HOSPITALIZED = "current_hospitalized",
    CURRENT_VENTILATED = "current_ventilated",
    POPULATION = "population",
    STAFFED_BEDS = "staffed_beds",
    LICENSED_BEDS = "licensed_beds",
    ICU_BEDS = "icu_beds",
    ALL_BED_TYPICAL_OCCUPANCY_RATE = "all_beds_occupancy_rate",
    ICU_TYPICAL_OCCUPANCY_RATE = "icu_occupancy_rate",
    MAX_BED_COUNT = "max_bed_count",
    VENTILATOR_CAPACITY = "ventilator_capacity",
    HOSPITAL_BEDS_IN_USE_ANY = "hospital_beds_in_use_any",
    CURRENT_HOSPITALIZED_TOTAL = "current_hospitalized_total",
    CURRENT_ICU_TOTAL = "current_icu_total",
    CONTACT_TRACERS_COUNT = "contact_tracers_count",
    MODEL_ABBR = "model_abbr",
    FORECAST_DATE = "forecast_date",
    QUANTILE = "quantile",
}

/// The (region id, date) pair that uniquely identifies a timeseries row.
pub const TIMESERIES_KEYS: [Field; 2] = [FIPS, DATE];

/// Fields always read as text so codes like `06045` keep their leading zero.
pub const TEXT_FIELDS: &[Field] = &[
    FIPS,
    STATE,
    COUNTRY,
    COUNTY,
    AGGREGATE_LEVEL,
    STATE_FULL_NAME,
    MODEL_ABBR,
];

pub const DATE_FIELDS: &[Field] = &[DATE, FORECAST_DATE];

pub fn timeseries_key_names() -> Vec<String> {
    TIMESERIES_KEYS.iter().map(|f| f.name().to_string()).collect()
}

fn by_name() -> &'static HashMap<&'static str, Field> {
    static LOOKUP: OnceLock<HashMap<&'static str, Field>> = OnceLock::new();
    LOOKUP.get_or_init(|| FIELDS.iter().map(|f| (f.name, *f)).collect())
}

/// Returns the field named exactly `name`, or `None` when it is not canonical.
pub fn lookup(name: &str) -> Option<Field> {
    by_name().get(name).copied()
}

pub fn order_index(field: Field) -> usize {
    field.position
}

/// Sort key for an arbitrary column name: registry fields by position, then
/// everything else alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnSortKey<'a> {
    Registry(usize),
    Extra(&'a str),
}

pub fn column_sort_key(name: &str) -> ColumnSortKey<'_> {
    match lookup(name) {
        Some(field) => ColumnSortKey::Registry(field.position),
        None => ColumnSortKey::Extra(name),
    }
}

pub fn compare_columns(left: &str, right: &str) -> Ordering {
    column_sort_key(left).cmp(&column_sort_key(right))
}

/// Returns `names` sorted into output order.
pub fn sort_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.as_ref().to_string())
        .sorted_by(|a, b| compare_columns(a, b))
        .collect()
}
