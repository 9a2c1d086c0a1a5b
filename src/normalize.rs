//! The per-source pipeline: raw table in, canonical table out.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    adjust::{apply_assignments, apply_replacements, null_ranges, null_state_level},
    cli::NormalizeArgs,
    common_csv,
    events::{EventSink, LogSink},
    fields::{DATE, FIPS, STATE},
    filter::{drop_rows_missing, parse_date_column, strip_whitespace},
    index::{DuplicatePolicy, only_common_columns, resolve_duplicate_keys},
    io_utils,
    mapping::{MappingConfig, rename_fields},
    reference::{
        CountyReference, RegionLookup, StateReference, annotate_by_state_name, annotate_regions,
        derive_fips,
    },
    table::Table,
};

/// Reference data used to name the region behind each FIPS.
#[derive(Debug, Clone, Default)]
pub struct References {
    pub counties: CountyReference,
    pub states: StateReference,
}

impl References {
    pub fn load(county_fips: &Path, census_states: &Path) -> Result<Self> {
        let counties = CountyReference::load(county_fips)
            .with_context(|| format!("Loading county reference {county_fips:?}"))?;
        let states = StateReference::load(census_states)
            .with_context(|| format!("Loading census states {census_states:?}"))?;
        if counties.is_empty() {
            anyhow::bail!("County reference {county_fips:?} has no rows");
        }
        if states.is_empty() {
            anyhow::bail!("Census state file {census_states:?} has no rows");
        }
        info!(
            "Loaded {} counties and {} states as region references",
            counties.len(),
            states.len()
        );
        Ok(Self { counties, states })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    pub references: Option<&'a References>,
    /// Overrides the policy carried by the mapping config.
    pub duplicates: Option<DuplicatePolicy>,
    /// Forces registry-only output even when the mapping keeps extra columns.
    pub only_common: bool,
}

/// Turns a raw source table into canonical fields. The result still needs
/// [`crate::index::fix_index`], which the CSV writer applies.
pub fn normalize_source(
    table: Table,
    config: &MappingConfig,
    options: NormalizeOptions<'_>,
    sink: &mut dyn EventSink,
) -> Result<Table> {
    let mapping = config.mapping()?;
    let mut table = strip_whitespace(table);
    if let Some(source) = &config.fips_from {
        table = derive_fips(table, source)
            .with_context(|| format!("Deriving fips from '{source}'"))?;
    }
    let table = rename_fields(table, &mapping, &config.transformed_columns(), sink)?;
    let table = parse_date_column(table, DATE.name(), sink)?;
    let adjustments = &config.adjustments;
    let table = apply_replacements(table, &adjustments.replace)?;
    let mut table = apply_assignments(table, &adjustments.assign)?;

    let mut important = vec![FIPS.name(), DATE.name()];
    if let Some(refs) = options.references {
        table = match config.regions {
            RegionLookup::ByFips => annotate_regions(table, &refs.counties, &refs.states, sink)?,
            RegionLookup::ByStateName => annotate_by_state_name(table, &refs.states)?,
        };
        important.push(STATE.name());
    }
    let table = drop_rows_missing(table, &important, sink)?;
    let table = null_state_level(table, &adjustments.state_level_nulls)?;
    let table = null_ranges(table, &adjustments.null_ranges)?;

    let policy = options.duplicates.unwrap_or(config.duplicates);
    debug!("Resolving duplicate keys with policy {policy:?}");
    let table = resolve_duplicate_keys(table, policy, sink)?;

    Ok(if options.only_common || config.only_common {
        only_common_columns(table, sink)
    } else {
        table
    })
}

pub fn execute(args: &NormalizeArgs) -> Result<()> {
    let config = match (&args.mapping, args.source) {
        (Some(path), _) => MappingConfig::load(path)?,
        (None, Some(source)) => source.config(),
        (None, None) => anyhow::bail!("Either --source or --mapping is required"),
    };
    let references = match (&args.county_fips, &args.census_states) {
        (Some(counties), Some(states)) => Some(References::load(counties, states)?),
        _ => None,
    };
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Normalizing '{}' as '{}' (delimiter '{}')",
        args.input.display(),
        config.name,
        crate::printable_delimiter(delimiter)
    );

    let raw = common_csv::read_source_csv(&args.input, delimiter, encoding, &config.text_columns)?;
    let raw_rows = raw.len();
    let mut sink = LogSink;
    let table = normalize_source(
        raw,
        &config,
        NormalizeOptions {
            references: references.as_ref(),
            duplicates: args.duplicates,
            only_common: args.only_common,
        },
        &mut sink,
    )
    .with_context(|| format!("Normalizing {:?}", args.input))?;
    let rows = table.len();
    common_csv::write_csv(table, &args.output, &mut sink)?;
    info!(
        "Wrote {} of {} row(s) to {:?}",
        rows,
        raw_rows,
        args.output
    );
    Ok(())
}
