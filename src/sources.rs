//! Mappings for the upstream datasets this crate knows about out of the box.
//!
//! Other sources are described with a YAML [`MappingConfig`] passed on the
//! command line.

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::{
    adjust::{Adjustments, Assignment, NullRange, Replacement},
    fields::{
        CASES, CURRENT_HOSPITALIZED, CURRENT_ICU, CURRENT_ICU_TOTAL, CURRENT_VENTILATED, COUNTY,
        DATE, DEATHS, FIPS, Field, HOSPITAL_BEDS_IN_USE_ANY, ICU_BEDS, NEGATIVE_TESTS,
        POSITIVE_TESTS, RECOVERED, STAFFED_BEDS, STATE_FULL_NAME, TOTAL_TESTS,
    },
    index::DuplicatePolicy,
    mapping::{MappingConfig, SourceField},
    reference::RegionLookup,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum BuiltinSource {
    /// New York Times county and state case counts.
    Nytimes,
    /// Covid Modeling Data Collaborative county and state timeseries.
    CovidCountyData,
}

// NYTimes publishes `state` as the full state name.
const NYTIMES_FIELDS: &[(&str, Option<Field>)] = &[
    ("date", Some(DATE)),
    ("county", Some(COUNTY)),
    ("state", Some(STATE_FULL_NAME)),
    ("fips", Some(FIPS)),
    ("cases", Some(CASES)),
    ("deaths", Some(DEATHS)),
];

// `location` is a numeric FIPS turned into the `fips` column before mapping.
const COVID_COUNTY_DATA_FIELDS: &[(&str, Option<Field>)] = &[
    ("location", None),
    ("dt", Some(DATE)),
    ("negative_tests_total", Some(NEGATIVE_TESTS)),
    ("positive_tests_total", Some(POSITIVE_TESTS)),
    ("tests_total", Some(TOTAL_TESTS)),
    ("active_total", None),
    ("cases_total", Some(CASES)),
    ("cases_confirmed", None),
    ("cases_suspected", None),
    ("recovered_total", Some(RECOVERED)),
    ("deaths_total", Some(DEATHS)),
    ("deaths_confirmed", None),
    ("deaths_suspected", None),
    ("hospital_beds_capacity_count", Some(STAFFED_BEDS)),
    ("hospital_beds_in_use_covid_confirmed", None),
    ("hospital_beds_in_use_covid_new", None),
    ("hospital_beds_in_use_covid_suspected", None),
    ("hospital_beds_in_use_any", Some(HOSPITAL_BEDS_IN_USE_ANY)),
    ("hospital_beds_in_use_covid_total", Some(CURRENT_HOSPITALIZED)),
    ("num_hospitals_reporting", None),
    ("num_of_hospitals", None),
    ("icu_beds_capacity_count", Some(ICU_BEDS)),
    ("icu_beds_in_use_covid_confirmed", None),
    ("icu_beds_in_use_covid_suspected", None),
    ("icu_beds_in_use_any", Some(CURRENT_ICU_TOTAL)),
    ("icu_beds_in_use_covid_total", Some(CURRENT_ICU)),
    ("ventilators_in_use_any", None),
    ("ventilators_capacity_count", None),
    ("ventilators_in_use_covid_total", Some(CURRENT_VENTILATED)),
    ("ventilators_in_use_covid_confirmed", None),
    ("ventilators_in_use_covid_suspected", None),
];

fn source_fields(pairs: &[(&str, Option<Field>)]) -> Vec<SourceField> {
    pairs
        .iter()
        .map(|(source, field)| SourceField::new(source, *field))
        .collect()
}

fn replace(column: Field, from: &str, to: &str) -> Replacement {
    Replacement {
        column: column.name().to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn nytimes_adjustments() -> Adjustments {
    Adjustments {
        replace: vec![
            // The census file spells out the territory.
            replace(STATE_FULL_NAME, "Virgin Islands", "U.S. Virgin Islands"),
            // NYTimes reports the five boroughs as one region without a FIPS.
            replace(COUNTY, "New York City", "New York County"),
        ],
        assign: vec![Assignment {
            when_column: COUNTY.name().to_string(),
            equals: "New York County".to_string(),
            column: FIPS.name().to_string(),
            value: NEW_YORK_COUNTY_FIPS.to_string(),
        }],
        ..Default::default()
    }
}

fn covid_county_data_adjustments() -> Adjustments {
    Adjustments {
        // State level bed counts come from HHS and disagree with county sums.
        state_level_nulls: [ICU_BEDS, HOSPITAL_BEDS_IN_USE_ANY, STAFFED_BEDS, CURRENT_ICU_TOTAL]
            .iter()
            .map(|f| f.name().to_string())
            .collect(),
        null_ranges: vec![NullRange {
            column: CURRENT_ICU.name().to_string(),
            fips: "12".to_string(),
            start: NaiveDate::from_ymd_opt(2020, 5, 14).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2020, 5, 20).unwrap_or_default(),
        }],
        ..Default::default()
    }
}

const NEW_YORK_COUNTY_FIPS: &str = "36061";

impl BuiltinSource {
    pub fn config(self) -> MappingConfig {
        match self {
            BuiltinSource::Nytimes => MappingConfig {
                name: "nytimes".to_string(),
                fields: source_fields(NYTIMES_FIELDS),
                already_transformed: Vec::new(),
                fips_from: None,
                text_columns: vec![FIPS.name().to_string()],
                duplicates: DuplicatePolicy::Fail,
                regions: RegionLookup::ByStateName,
                only_common: false,
                adjustments: nytimes_adjustments(),
            },
            BuiltinSource::CovidCountyData => MappingConfig {
                name: "covid-county-data".to_string(),
                fields: source_fields(COVID_COUNTY_DATA_FIELDS),
                already_transformed: Vec::new(),
                fips_from: Some("location".to_string()),
                text_columns: Vec::new(),
                duplicates: DuplicatePolicy::Fail,
                regions: RegionLookup::ByFips,
                only_common: true,
                adjustments: covid_county_data_adjustments(),
            },
        }
    }
}
