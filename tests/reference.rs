mod common;

use covid_data_public::{
    events::{self, CaptureSink},
    normalize::References,
    reference::{CountyReference, StateReference, annotate_regions},
    table::{Table, int, text},
};
use serde_json::json;

use common::fixture_path;

#[test]
fn county_reference_pads_numeric_fips() {
    let counties = CountyReference::load(&fixture_path("fips_population.csv")).unwrap();
    assert_eq!(counties.len(), 4);
    let record = counties.get("06075").expect("padded fips");
    assert_eq!(record.county, "San Francisco County");
    assert_eq!(record.state, "CA");
    assert!(counties.get("6075").is_none());
}

#[test]
fn census_states_are_pipe_delimited() {
    let states = StateReference::load(&fixture_path("state.txt")).unwrap();
    assert_eq!(states.get("36").map(|s| s.state.as_str()), Some("NY"));
    assert_eq!(states.get("06").map(|s| s.name.as_str()), Some("California"));
}

#[test]
fn unknown_counties_are_reported_once_each() {
    let refs = References::load(
        &fixture_path("fips_population.csv"),
        &fixture_path("state.txt"),
    )
    .unwrap();
    let table = Table::from_literals(
        &["fips", "cases"],
        vec![
            vec![text("99999"), int(1)],
            vec![text("36061"), int(2)],
            vec![text("99999"), int(3)],
            vec![text("12345"), int(4)],
        ],
    )
    .unwrap();
    let mut sink = CaptureSink::new();
    let out = annotate_regions(table, &refs.counties, &refs.states, &mut sink).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.cell(0, "state"), Some(&text("NY")));
    assert_eq!(out.cell(0, "aggregate_level"), Some(&text("county")));
    assert_eq!(sink.messages(), vec![events::UNMATCHED_COUNTIES]);
    assert_eq!(
        sink.events[0].field("bad_fips"),
        Some(&json!(["99999", "12345"]))
    );
}

#[test]
fn missing_reference_file_is_an_error() {
    assert!(CountyReference::load(&fixture_path("does_not_exist.csv")).is_err());
}
