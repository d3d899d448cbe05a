//! Subcommand implementations.

pub mod namespace;
pub mod table;

use anyhow::{bail, Result};
use lakecat_core::Properties;

/// Parse a `key=value` argument.
pub fn parse_key_val(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("expected key=value, got '{}'", arg),
    }
}

/// Print properties sorted by key, one `key=value` per line.
pub fn print_properties(properties: &Properties) {
    let mut entries: Vec<_> = properties.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{}={}", key, value);
    }
}
