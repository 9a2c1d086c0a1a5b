pub mod adjust;
pub mod cli;
pub mod common_csv;
pub mod data;
pub mod error;
pub mod events;
pub mod fields;
pub mod fields_cmd;
pub mod filter;
pub mod index;
pub mod io_utils;
pub mod mapping;
pub mod normalize;
pub mod reference;
pub mod render;
pub mod sources;
pub mod table;
pub mod verify;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("covid_data_public", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => normalize::execute(&args),
        Commands::Fields => fields_cmd::execute(),
        Commands::Verify(args) => verify::execute(&args),
        Commands::Mapping(args) => handle_mapping(&args),
    }
}

fn handle_mapping(args: &cli::MappingArgs) -> Result<()> {
    let config = args.source.config();
    config
        .save(&args.output)
        .with_context(|| format!("Writing mapping to {:?}", args.output))?;
    info!(
        "Mapping '{}' with {} field(s) written to {:?}",
        config.name,
        config.fields.len(),
        args.output
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
