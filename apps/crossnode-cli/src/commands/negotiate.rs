//! Negotiate command - Preview level-of-assurance negotiation

use super::print_json;
use crate::error::{CliError, CliResult};
use clap::{Args, ValueEnum};
use crossnode_protocol::models::{
    parse_loa_list, version, LevelOfAssurance, LoaComparison, NotifiedLevel,
};
use crossnode_protocol::negotiation::{self, CompatibilityMode};
use serde::Serialize;

/// Arguments for the negotiate command
#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// Published levels in publication order, `;` or `,` separated.
    /// `low`, `substantial` and `high` stand for the notified levels.
    #[arg(long)]
    pub published: String,

    /// Protocol versions advertised by the peer
    #[arg(long, value_delimiter = ',', default_value = "1.2")]
    pub peer_versions: Vec<String>,

    /// Levels carried by the peer's request
    #[arg(long)]
    pub requested: Option<String>,

    /// Comparison carried by the peer's request
    #[arg(long, value_enum, default_value_t = Comparison::Minimum)]
    pub comparison: Comparison,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Comparison {
    Minimum,
    Exact,
}

impl From<Comparison> for LoaComparison {
    fn from(comparison: Comparison) -> Self {
        match comparison {
            Comparison::Minimum => LoaComparison::Minimum,
            Comparison::Exact => LoaComparison::Exact,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NegotiationReport {
    pub mode: CompatibilityMode,
    pub level: String,
    /// Whether the negotiated level satisfies the requested levels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfies_request: Option<bool>,
}

/// Parse a level list, expanding the short names of notified levels
pub(crate) fn parse_levels(value: &str) -> CliResult<Vec<LevelOfAssurance>> {
    let expanded: Vec<String> = value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NotifiedLevel::ALL
                .into_iter()
                .find(|level| {
                    level
                        .uri()
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| name.eq_ignore_ascii_case(s))
                })
                .map_or_else(|| s.to_string(), |level| level.uri().to_string())
        })
        .collect();
    parse_loa_list(&expanded.join(";")).map_err(|e| CliError::Validation(e.to_string()))
}

/// Negotiate as an inbound request from a peer advertising `peer_versions`
pub fn run(args: &NegotiateArgs) -> CliResult<NegotiationReport> {
    let published = parse_levels(&args.published)?;
    let mode = CompatibilityMode::from(version::generation_of(args.peer_versions.as_slice()));
    let outcome = negotiation::negotiate(&published, mode)?;

    let satisfies_request = match &args.requested {
        Some(requested) => {
            let requested = parse_levels(requested)?;
            negotiation::validate_requested_loas(&requested, args.comparison.into())?;
            Some(negotiation::is_equal_or_better(
                &requested,
                std::slice::from_ref(&outcome.level),
            ))
        }
        None => None,
    };

    Ok(NegotiationReport {
        mode: outcome.mode,
        level: outcome.level.to_string(),
        satisfies_request,
    })
}

/// Execute the negotiate command
pub fn execute(args: NegotiateArgs) -> CliResult<()> {
    let report = run(&args)?;

    if args.json {
        return print_json(&report);
    }

    println!("Mode:  {}", report.mode);
    println!("Level: {}", report.level);
    match report.satisfies_request {
        Some(true) => println!("The request is satisfied"),
        Some(false) => {
            return Err(CliError::Validation(format!(
                "{} does not satisfy the requested levels",
                report.level
            )))
        }
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGH: &str = "http://eidas.europa.eu/LoA/high";

    fn args(published: &str, versions: &[&str]) -> NegotiateArgs {
        NegotiateArgs {
            published: published.to_string(),
            peer_versions: versions.iter().map(ToString::to_string).collect(),
            requested: None,
            comparison: Comparison::Minimum,
            json: false,
        }
    }

    #[test]
    fn test_short_names_expand_to_notified_levels() {
        let levels = parse_levels("high; Substantial,http://example.org/loa/custom").unwrap();
        assert_eq!(levels[0], NotifiedLevel::High.into());
        assert_eq!(levels[1], NotifiedLevel::Substantial.into());
        assert!(!levels[2].is_notified());
    }

    #[test]
    fn test_unknown_notified_uri_is_refused() {
        assert!(matches!(
            parse_levels("http://eidas.europa.eu/LoA/extreme"),
            Err(CliError::Validation(_))
        ));
    }

    #[test]
    fn test_current_peer_reads_whole_list() {
        let report = run(&args("substantial;high", &["1.2", "1.1"])).unwrap();
        assert_eq!(report.mode, CompatibilityMode::Current);
        assert_eq!(report.level, HIGH);
    }

    #[test]
    fn test_legacy_peer_refuses_misordered_list() {
        let err = run(&args("substantial;high", &["1.1"])).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_requested_level_is_checked() {
        let mut request = args("substantial", &["1.2"]);
        request.requested = Some("high".to_string());
        let report = run(&request).unwrap();
        assert_eq!(report.satisfies_request, Some(false));

        request.requested = Some("low".to_string());
        let report = run(&request).unwrap();
        assert_eq!(report.satisfies_request, Some(true));
    }

    #[test]
    fn test_malformed_request_shape_is_refused() {
        let mut request = args("high", &["1.2"]);
        request.requested = Some("high".to_string());
        request.comparison = Comparison::Exact;
        assert!(matches!(run(&request), Err(CliError::Validation(_))));
    }
}
