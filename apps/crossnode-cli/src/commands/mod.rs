//! CLI command implementations

pub mod attributes;
pub mod check_config;
pub mod negotiate;
pub mod resolve;

use crate::error::CliResult;
use serde::Serialize;

/// Print a report as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(report: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
