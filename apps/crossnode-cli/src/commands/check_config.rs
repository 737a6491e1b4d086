//! Check-config command - Validate the engine configuration

use super::print_json;
use crate::error::CliResult;
use clap::Args;
use crossnode_protocol::negotiation::{self, CompatibilityMode};
use crossnode_protocol::EngineConfig;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Arguments for the check-config command
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Environment file to load before reading the configuration
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Summary of a loaded configuration
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub entity_id: String,
    pub role: String,
    pub country: Option<String>,
    pub endpoints: Vec<String>,
    pub published_loas: Vec<String>,
    pub protocol_versions: Vec<String>,
    pub requester_id_required: bool,
    /// Level current peers read from the published list.
    pub current_reading: Option<String>,
    /// Level legacy peers read, `None` when they would refuse the list.
    pub legacy_reading: Option<String>,
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn inspect(config: &EngineConfig) -> Self {
        let reading = |mode| {
            negotiation::negotiate(&config.published_loas, mode)
                .ok()
                .map(|outcome| outcome.level.to_string())
        };

        let mut warnings = Vec::new();
        let legacy_reading = reading(CompatibilityMode::Legacy);
        if legacy_reading.is_none() {
            warnings.push(
                "the first published level is not the highest notified level; \
                 legacy peers will refuse requests"
                    .to_string(),
            );
        }
        if !config.metadata_https_only {
            warnings.push("metadata may be fetched over plain HTTP".to_string());
        }
        if !config.validate_binding {
            warnings.push("binding validation is disabled".to_string());
        }

        Self {
            entity_id: config.node_entity_id.to_string(),
            role: config.node_role.to_string(),
            country: config.node_country.as_ref().map(ToString::to_string),
            endpoints: config.local_endpoints.clone(),
            published_loas: config.published_loas.iter().map(ToString::to_string).collect(),
            protocol_versions: config.protocol_versions.clone(),
            requester_id_required: config.requester_id_required,
            current_reading: reading(CompatibilityMode::Current),
            legacy_reading,
            warnings,
        }
    }
}

/// Execute the check-config command
pub fn execute(args: CheckConfigArgs) -> CliResult<()> {
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                crate::error::CliError::Config(format!("cannot load {}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "Environment file loaded");
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let config = EngineConfig::from_env()?;
    let report = ConfigReport::inspect(&config);
    for warning in &report.warnings {
        warn!(warning = %warning, "Configuration warning");
    }

    if args.json {
        return print_json(&report);
    }

    println!("Configuration OK");
    println!("  Entity:     {}", report.entity_id);
    println!("  Role:       {}", report.role);
    if let Some(country) = &report.country {
        println!("  Country:    {country}");
    }
    for endpoint in &report.endpoints {
        println!("  Endpoint:   {endpoint}");
    }
    println!("  Published:  {}", report.published_loas.join(", "));
    println!("  Versions:   {}", report.protocol_versions.join(", "));
    println!(
        "  Current peers read: {}",
        report.current_reading.as_deref().unwrap_or("-")
    );
    println!(
        "  Legacy peers read:  {}",
        report.legacy_reading.as_deref().unwrap_or("refused")
    );
    for warning in &report.warnings {
        println!("  Warning: {warning}");
    }
    Ok(())
}
