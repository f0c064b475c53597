//! gridtap CLI entry point.

mod args;

use std::io::Read;
use std::path::Path;

use clap::Parser;
use gridtap_core::config::{encoding_for_label, GridConfig};
use gridtap_core::error::{ErrorReport, GridError};
use gridtap_core::keys::KeySequence;
use gridtap_core::table::{decode_file, decode_text, RowSet};
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands, DecodeArgs};

fn main() {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<GridError>() {
            Some(grid_error) => {
                let report = ErrorReport::from(grid_error);
                error!(code = %report.code, "{}", report.message);
                eprintln!("Error: {}", report);
            }
            None => {
                error!("{:#}", e);
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }
}

/// `RUST_LOG` when it parses, INFO otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Decode(args) => {
            let rows = decode(&args)?;
            print_json(&rows.rows)?;
        }
        Commands::Keys(args) => {
            let keys = KeySequence::parse(&args.sequence)?;
            print_json(&KeysOutput {
                canonical: keys.to_string(),
                send_keys: keys.to_send_keys(),
                sequence: &keys,
            })?;
        }
        Commands::Config(args) => {
            let config = load_config(args.config.as_deref())?;
            print_json(&config)?;
        }
        Commands::Examples => println!("{}", args::EXAMPLES_TEXT),
    }
    Ok(())
}

#[derive(Serialize)]
struct KeysOutput<'a> {
    canonical: String,
    send_keys: String,
    #[serde(flatten)]
    sequence: &'a KeySequence,
}

fn load_config(explicit: Option<&Path>) -> Result<GridConfig, GridError> {
    Ok(GridConfig::resolve(explicit)?)
}

fn decode(args: &DecodeArgs) -> Result<RowSet, GridError> {
    let mut config = load_config(args.config.as_deref())?;
    for (column, kind) in &args.types {
        config.column_types.insert(column.clone(), *kind);
    }

    let rows = match &args.file {
        Some(path) => {
            let label = args.encoding.as_deref().unwrap_or(&config.export_encoding);
            let encoding = encoding_for_label(label)?;
            debug!(path = %path.display(), encoding = encoding.name(), "decoding file");
            decode_file(path, &config.column_types, encoding)?
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| GridError::io("<stdin>", e))?;
            decode_text(&text, &config.column_types)?
        }
    };
    if rows.lossy {
        tracing::warn!("some bytes could not be decoded and were replaced");
    }
    Ok(rows)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
