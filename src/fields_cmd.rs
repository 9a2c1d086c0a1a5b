//! Listing of the canonical field registry.

use anyhow::Result;
use log::info;

use crate::{
    fields::{DATE_FIELDS, FIELDS, TEXT_FIELDS, TIMESERIES_KEYS},
    render,
};

pub fn registry_rows() -> Vec<Vec<String>> {
    FIELDS
        .iter()
        .map(|field| {
            let kind = if DATE_FIELDS.contains(field) {
                "date"
            } else if TEXT_FIELDS.contains(field) {
                "text"
            } else {
                "number"
            };
            let key = if TIMESERIES_KEYS.contains(field) { "yes" } else { "" };
            vec![
                field.position().to_string(),
                field.name().to_string(),
                kind.to_string(),
                key.to_string(),
            ]
        })
        .collect()
}

pub fn execute() -> Result<()> {
    let headers = vec![
        "#".to_string(),
        "name".to_string(),
        "type".to_string(),
        "key".to_string(),
    ];
    render::print_rows(&headers, &registry_rows());
    info!("Listed {} field(s)", FIELDS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_registry_order() {
        let rows = registry_rows();
        assert_eq!(rows.len(), FIELDS.len());
        assert_eq!(rows[0], vec!["0", "fips", "text", "yes"]);
        assert_eq!(rows[1], vec!["1", "date", "date", "yes"]);
        assert_eq!(rows[7][1], "cases");
        assert_eq!(rows[7][2], "number");
    }
}
