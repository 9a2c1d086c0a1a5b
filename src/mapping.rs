//! Source column mappings and the column mapper.
//!
//! Every upstream source ships its own column names. A [`SourceMapping`] pairs
//! each of them with the canonical field it becomes, or `None` when the
//! column is deliberately dropped. [`rename_fields`] applies a mapping to a
//! raw table and reports columns that drifted from what the mapping expects.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    adjust::Adjustments,
    error::ConfigError,
    events::{self, Event, EventSink},
    fields::{self, Field},
    index::DuplicatePolicy,
    reference::RegionLookup,
    table::Table,
};

/// One source column and the canonical field it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    pub source: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl SourceField {
    pub fn new(source: &str, field: Option<Field>) -> Self {
        Self {
            source: source.to_string(),
            field: field.map(|f| f.name().to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceMapping {
    name: String,
    entries: Vec<(String, Option<Field>)>,
    by_source: HashMap<String, Option<Field>>,
}

impl SourceMapping {
    /// Validates and builds a mapping. Unknown canonical names, repeated
    /// source columns and two sources feeding one field are all rejected.
    pub fn new(name: &str, fields: &[SourceField]) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(fields.len());
        let mut by_source = HashMap::with_capacity(fields.len());
        let mut targets: HashMap<Field, &str> = HashMap::new();
        for entry in fields {
            let target = match &entry.field {
                Some(field_name) => Some(
                    fields::lookup(field_name)
                        .ok_or_else(|| ConfigError::UnknownField(field_name.clone()))?,
                ),
                None => None,
            };
            if by_source.insert(entry.source.clone(), target).is_some() {
                return Err(ConfigError::DuplicateSource(entry.source.clone()));
            }
            if let Some(field) = target {
                if let Some(first) = targets.insert(field, &entry.source) {
                    return Err(ConfigError::DuplicateTarget {
                        field: field.name().to_string(),
                        first: first.to_string(),
                        second: entry.source.clone(),
                    });
                }
            }
            entries.push((entry.source.clone(), target));
        }
        Ok(Self {
            name: name.to_string(),
            entries,
            by_source,
        })
    }

    pub fn from_pairs(name: &str, pairs: &[(&str, Option<Field>)]) -> Result<Self, ConfigError> {
        let fields = pairs
            .iter()
            .map(|(source, field)| SourceField::new(source, *field))
            .collect::<Vec<_>>();
        Self::new(name, &fields)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Some(None)` means the column is known and explicitly dropped.
    pub fn get(&self, source: &str) -> Option<Option<Field>> {
        self.by_source.get(source).copied()
    }

    pub fn entries(&self) -> &[(String, Option<Field>)] {
        &self.entries
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(source, _)| source.as_str())
    }
}

/// Returns a table holding only mapped columns, renamed to their canonical
/// fields in mapping order, followed by the `already_transformed` columns.
///
/// Columns the mapping does not know and mapped columns missing from the
/// table are reported in one warning; neither is fatal.
pub fn rename_fields<S: AsRef<str>>(
    table: Table,
    mapping: &SourceMapping,
    already_transformed: &[S],
    sink: &mut dyn EventSink,
) -> Result<Table> {
    let table = if table.has_index() {
        table.reset_index()?
    } else {
        table
    };
    let already = already_transformed
        .iter()
        .map(|s| s.as_ref())
        .collect::<HashSet<_>>();
    let present = table
        .column_names()
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    let extra_fields = table
        .column_names()
        .iter()
        .map(String::as_str)
        .filter(|c| mapping.get(c).is_none() && !already.contains(c))
        .collect::<BTreeSet<_>>();
    let missing_fields = mapping
        .source_names()
        .filter(|s| !present.contains(s))
        .collect::<BTreeSet<_>>();
    if !extra_fields.is_empty() || !missing_fields.is_empty() {
        sink.emit(
            Event::warn(events::UNEXPECTED_COLUMNS)
                .with("source", mapping.name())
                .with("extra_fields", json!(extra_fields))
                .with("missing_fields", json!(missing_fields)),
        );
    }

    let kept_already = table
        .column_names()
        .iter()
        .filter(|c| already.contains(c.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    let mut renames = BTreeMap::new();
    let mut claimed: HashMap<&str, &str> = kept_already
        .iter()
        .map(|c| (c.as_str(), c.as_str()))
        .collect();
    let mut selected = Vec::new();
    for (source, target) in mapping.entries() {
        let Some(field) = target else { continue };
        if !present.contains(source.as_str()) || already.contains(source.as_str()) {
            continue;
        }
        if let Some(first) = claimed.insert(field.name(), source) {
            return Err(ConfigError::DuplicateTarget {
                field: field.name().to_string(),
                first: first.to_string(),
                second: source.clone(),
            }
            .into());
        }
        selected.push(source.clone());
        renames.insert(source.clone(), field.name().to_string());
    }
    selected.extend(kept_already);

    let table = table
        .select(&selected)
        .context("Selecting mapped columns")?
        .rename(&renames)?;
    Ok(table)
}

/// On-disk description of a source: its mapping plus how to prepare the raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub name: String,
    pub fields: Vec<SourceField>,
    /// Columns computed before renaming that already carry canonical names.
    #[serde(default)]
    pub already_transformed: Vec<String>,
    /// Numeric region code column to derive `fips` from.
    #[serde(default)]
    pub fips_from: Option<String>,
    /// Columns read as text instead of being inferred as numbers.
    #[serde(default)]
    pub text_columns: Vec<String>,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    #[serde(default)]
    pub regions: RegionLookup,
    /// Drop columns outside the field registry before writing.
    #[serde(default)]
    pub only_common: bool,
    #[serde(default, skip_serializing_if = "Adjustments::is_empty")]
    pub adjustments: Adjustments,
}

impl MappingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing mapping YAML {path:?}"))?;
        config.mapping()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping YAML")
    }

    pub fn mapping(&self) -> Result<SourceMapping, ConfigError> {
        SourceMapping::new(&self.name, &self.fields)
    }

    /// Names that bypass the mapping, including a derived `fips`.
    pub fn transformed_columns(&self) -> Vec<String> {
        let mut names = self.already_transformed.clone();
        if self.fips_from.is_some() && !names.iter().any(|n| n == fields::FIPS.name()) {
            names.push(fields::FIPS.name().to_string());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::CaptureSink,
        fields::{CASES, DATE, DEATHS, FIPS},
        table::{int, text},
    };

    fn mapping() -> SourceMapping {
        SourceMapping::from_pairs(
            "test",
            &[
                ("dt", Some(DATE)),
                ("location", None),
                ("cases_total", Some(CASES)),
                ("deaths_total", Some(DEATHS)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn two_sources_for_one_field_is_a_config_error() {
        let err = SourceMapping::from_pairs("bad", &[("a", Some(CASES)), ("b", Some(CASES))])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateTarget {
                field: "cases".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn unknown_field_is_a_config_error() {
        let fields = vec![SourceField {
            source: "x".into(),
            field: Some("not_a_field".into()),
        }];
        assert_eq!(
            SourceMapping::new("bad", &fields).unwrap_err(),
            ConfigError::UnknownField("not_a_field".into())
        );
    }

    #[test]
    fn renames_in_mapping_order_and_drops_explicit_none() {
        let table = Table::from_literals(
            &["deaths_total", "location", "fips", "dt", "cases_total"],
            vec![vec![int(1), int(6045), text("06045"), text("2020-04-01"), int(10)]],
        )
        .unwrap();
        let mut sink = CaptureSink::new();
        let out = rename_fields(table, &mapping(), &["fips"], &mut sink).unwrap();
        assert_eq!(out.column_names(), ["date", "cases", "deaths", "fips"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn already_transformed_target_collision_fails() {
        let table =
            Table::from_literals(&["dt", "date"], vec![vec![text("2020-04-01"), text("x")]])
                .unwrap();
        let mapping = SourceMapping::from_pairs("t", &[("dt", Some(DATE))]).unwrap();
        let mut sink = CaptureSink::new();
        let err = rename_fields(table, &mapping, &["date"], &mut sink).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateTarget { .. })
        ));
    }

    #[test]
    fn transformed_columns_include_derived_fips() {
        let config = MappingConfig {
            name: "cmdc".into(),
            fields: vec![SourceField::new("location", None), SourceField::new("dt", Some(DATE))],
            already_transformed: vec![],
            fips_from: Some("location".into()),
            text_columns: vec![],
            duplicates: DuplicatePolicy::Fail,
            regions: RegionLookup::ByFips,
            only_common: false,
            adjustments: Adjustments::default(),
        };
        assert_eq!(config.transformed_columns(), vec![FIPS.name().to_string()]);
    }
}
