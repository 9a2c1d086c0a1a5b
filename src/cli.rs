use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::{index::DuplicatePolicy, sources::BuiltinSource};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize public COVID-19 datasets into the shared CommonFields CSV layout",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Map a raw source CSV onto the canonical fields and write it indexed by fips and date
    Normalize(NormalizeArgs),
    /// List the canonical fields in output order
    Fields,
    /// Check that a CSV follows the canonical layout
    Verify(VerifyArgs),
    /// Write a built-in source mapping as YAML, as a starting point for a new source
    Mapping(MappingArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("mapping_source").required(true).args(["source", "mapping"])))]
pub struct NormalizeArgs {
    /// Raw source CSV (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination canonical CSV (`-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Built-in source mapping
    #[arg(short = 's', long = "source", value_enum)]
    pub source: Option<BuiltinSource>,
    /// YAML mapping file describing a source
    #[arg(short = 'm', long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// County reference CSV with `fips,state,county` columns
    #[arg(long = "county-fips", requires = "census_states")]
    pub county_fips: Option<PathBuf>,
    /// Pipe-delimited census state file (`STATE|STUSAB|STATE_NAME`)
    #[arg(long = "census-states", requires = "county_fips")]
    pub census_states: Option<PathBuf>,
    /// How to handle repeated (fips, date) keys; overrides the mapping's policy
    #[arg(long = "duplicates", value_enum)]
    pub duplicates: Option<DuplicatePolicy>,
    /// Drop every column that is not a canonical field
    #[arg(long = "only-common")]
    pub only_common: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// One or more canonical CSV files to verify
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Fail when a column is not a canonical field
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Built-in source to export
    #[arg(short = 's', long = "source", value_enum)]
    pub source: BuiltinSource,
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_delimiter_accepts_names() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn normalize_requires_a_mapping() {
        let parsed = Cli::try_parse_from(["covid-data-public", "normalize", "-i", "a", "-o", "b"]);
        assert!(parsed.is_err());
        let parsed = Cli::try_parse_from([
            "covid-data-public",
            "normalize",
            "-i",
            "a",
            "-o",
            "b",
            "--source",
            "covid-county-data",
            "--duplicates",
            "keep_last",
        ])
        .unwrap();
        match parsed.command {
            Commands::Normalize(args) => {
                assert_eq!(args.source, Some(BuiltinSource::CovidCountyData));
                assert_eq!(args.duplicates, Some(DuplicatePolicy::KeepLast));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
