//! Resolve command - Fetch and verify a peer's trust metadata

use super::print_json;
use crate::error::{CliError, CliResult};
use clap::{Args, ValueEnum};
use crossnode_core::EntityId;
use crossnode_protocol::metadata::{
    HttpMetadataFetcher, PinnedDigestVerifier, VerifiedDescriptor, DEFAULT_METADATA_TTL,
};
use crossnode_protocol::models::Role;
use crossnode_protocol::MetadataTrustResolver;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Entity identifier (metadata URL) of the peer
    pub entity_id: String,

    /// Hex-encoded SHA-256 digest the document must match
    #[arg(long)]
    pub sha256: String,

    /// Role the peer must publish
    #[arg(long, value_enum, default_value_t = PeerRole::Responder)]
    pub role: PeerRole,

    /// Fetch timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Allow metadata over plain HTTP
    #[arg(long)]
    pub allow_http: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeerRole {
    Requester,
    Responder,
}

impl From<PeerRole> for Role {
    fn from(role: PeerRole) -> Self {
        match role {
            PeerRole::Requester => Role::Requester,
            PeerRole::Responder => Role::Responder,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DescriptorReport {
    pub entity_id: String,
    pub generation: String,
    pub protocol_versions: Vec<String>,
    pub assurance_levels: Vec<String>,
    pub country: Option<String>,
    pub requester_id_flag: bool,
    pub default_endpoint: Option<String>,
    pub signing_certificates: usize,
}

impl DescriptorReport {
    fn new(verified: &VerifiedDescriptor, role: Role) -> Self {
        let descriptor = verified.descriptor();
        let role = descriptor.role(role);
        Self {
            entity_id: descriptor.entity_id.to_string(),
            generation: format!("{:?}", descriptor.generation()).to_lowercase(),
            protocol_versions: descriptor.protocol_versions.clone(),
            assurance_levels: descriptor
                .assurance_levels
                .iter()
                .map(ToString::to_string)
                .collect(),
            country: descriptor.node_country.as_ref().map(ToString::to_string),
            requester_id_flag: descriptor.requester_id_flag,
            default_endpoint: role.and_then(|r| r.default_endpoint.clone()),
            signing_certificates: role.map_or(0, |r| r.signing_certificates.len()),
        }
    }
}

pub async fn run(args: &ResolveArgs) -> CliResult<DescriptorReport> {
    let entity_id: EntityId = args
        .entity_id
        .parse()
        .map_err(|e: crossnode_core::ParseIdError| CliError::Validation(e.to_string()))?;
    let timeout = Duration::from_millis(args.timeout_ms);

    let fetcher = HttpMetadataFetcher::new(timeout, !args.allow_http)
        .map_err(|e| CliError::Network(e.to_string()))?;
    let verifier = PinnedDigestVerifier::new().pin(entity_id.as_str(), args.sha256.trim());
    let resolver =
        MetadataTrustResolver::new(Arc::new(fetcher), Arc::new(verifier), DEFAULT_METADATA_TTL);

    let role = Role::from(args.role);
    let verified = resolver.resolve(&entity_id, role, timeout).await?;
    info!(entity_id = %entity_id, %role, "Metadata verified");

    Ok(DescriptorReport::new(&verified, role))
}

/// Execute the resolve command
pub async fn execute(args: ResolveArgs) -> CliResult<()> {
    let report = run(&args).await?;

    if args.json {
        return print_json(&report);
    }

    println!("Metadata verified: {}", report.entity_id);
    println!("  Generation: {}", report.generation);
    println!("  Versions:   {}", report.protocol_versions.join(", "));
    println!("  Levels:     {}", report.assurance_levels.join(", "));
    if let Some(country) = &report.country {
        println!("  Country:    {country}");
    }
    if let Some(endpoint) = &report.default_endpoint {
        println!("  Endpoint:   {endpoint}");
    }
    println!("  Signing certificates: {}", report.signing_certificates);
    Ok(())
}
