//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gridtap_core::table::ColumnType;

const CONFIG_HELP: &str = "Config file [default: $GRIDTAP_CONFIG, then the user config dir]";

/// Offline tools for the gridtap grid reader.
///
/// Decode grid payloads the way the live strategies do, inspect key
/// sequences and show the effective configuration. Output is JSON on
/// stdout; logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "gridtap", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode a tab-separated grid payload into JSON rows
    #[command(after_help = "\
Examples:
  gridtap decode export.xls                      # GBK export file
  pbpaste | gridtap decode                       # Clipboard text from stdin
  gridtap decode --type 股票余额=int export.xls    # Force a column type
  gridtap decode --encoding utf-8 dump.tsv       # Non-default file encoding")]
    Decode(DecodeArgs),

    /// Parse a key sequence and show its send-keys form
    #[command(after_long_help = "\
Supported Keys:
  Navigation:  Enter, Tab, Escape, Backspace, Space, Delete, Insert
  Arrows:      Up, Down, Left, Right, Home, End, PageUp, PageDown
  Function:    F1 .. F12
  Modifiers:   Ctrl+<key>, Alt+<key>, Shift+<key>

Examples:
  gridtap keys \"Ctrl+A Ctrl+C\"                   # ^a^c
  gridtap keys \"Alt+S Alt+Y\"                     # %s%y")]
    Keys(KeysArgs),

    /// Print the effective configuration
    Config(ConfigArgs),

    /// Show an end-to-end usage example
    Examples,
}

#[derive(Debug, clap::Args)]
pub struct DecodeArgs {
    /// File to decode; reads UTF-8 text from stdin when omitted
    pub file: Option<PathBuf>,

    /// Column type override, repeatable (str, int, float or auto)
    #[arg(short, long = "type", value_name = "COL=TYPE", value_parser = parse_column_type)]
    pub types: Vec<(String, ColumnType)>,

    /// Encoding label for FILE [default: from config, gbk]
    #[arg(short, long, value_name = "LABEL")]
    pub encoding: Option<String>,

    #[arg(short, long, help = CONFIG_HELP)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct KeysArgs {
    /// Key sequence, e.g. "Ctrl+A Ctrl+C"
    pub sequence: String,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[arg(short, long, help = CONFIG_HELP)]
    pub config: Option<PathBuf>,
}

fn parse_column_type(s: &str) -> Result<(String, ColumnType), String> {
    let (column, kind) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COL=TYPE, got '{}'", s))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{}'", s));
    }
    Ok((column.to_string(), kind.trim().parse()?))
}

/// End-to-end example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"End-to-end example: check what a grid read would return

# 1. Look at the effective configuration (column types, folders, timings)
gridtap config

# 2. In the trading client, select the positions grid and copy it, or
#    save it with Ctrl+S to an .xls file

# 3. Decode the export the same way the file-export strategy does
gridtap decode positions.xls

# 4. Or decode copied text the way the clipboard strategies do
gridtap decode < positions.txt

# 5. Keep an identifier column as text and force a numeric one
gridtap decode --type 证券代码=str --type 股票余额=int positions.xls

# 6. Check the keystrokes a strategy sends
gridtap keys "Ctrl+A Ctrl+C"

Set RUST_LOG=debug to see each step on stderr.
"#;
