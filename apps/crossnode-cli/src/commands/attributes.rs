//! Check-attributes command - Apply the attribute policy to a request

use super::print_json;
use crate::error::{CliError, CliResult};
use clap::{Args, ValueEnum};
use crossnode_protocol::attributes::{
    legal_person, natural_person, representative_legal_person, representative_natural_person,
};
use crossnode_protocol::models::RequestedAttribute;
use crossnode_protocol::{AttributeRegistry, UnsupportedAttributePolicy};
use serde::Serialize;
use std::collections::HashSet;

/// Arguments for the check-attributes command
#[derive(Args, Debug)]
pub struct CheckAttributesArgs {
    /// Attribute the requester cannot proceed without (name URI or friendly name)
    #[arg(long = "required", value_name = "NAME")]
    pub required: Vec<String>,

    /// Attribute the requester can proceed without
    #[arg(long = "optional", value_name = "NAME")]
    pub optional: Vec<String>,

    /// Attribute the node does not support
    #[arg(long = "unsupported", value_name = "NAME")]
    pub unsupported: Vec<String>,

    /// What to do with unsupported optional attributes
    #[arg(long, value_enum, default_value_t = Policy::Drop)]
    pub policy: Policy,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    Drop,
    Reject,
}

impl From<Policy> for UnsupportedAttributePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Drop => UnsupportedAttributePolicy::Drop,
            Policy::Reject => UnsupportedAttributePolicy::Reject,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttributeReport {
    pub kept: Vec<RequestedAttribute>,
    pub dropped: Vec<String>,
}

/// Resolve a friendly name to its attribute URI.
///
/// Names containing a scheme are taken verbatim. `Representative` prefixes
/// select the representative variant.
pub(crate) fn resolve_name(registry: &AttributeRegistry, name: &str) -> CliResult<String> {
    if name.contains("://") {
        return Ok(name.to_string());
    }

    let candidates = match name.strip_prefix("Representative") {
        Some(friendly) => [
            representative_natural_person(friendly),
            representative_legal_person(friendly),
        ],
        None => [natural_person(name), legal_person(name)],
    };

    candidates
        .into_iter()
        .find(|uri| registry.get(uri).is_some())
        .ok_or_else(|| CliError::Validation(format!("unknown attribute: {name}")))
}

pub fn run(args: &CheckAttributesArgs) -> CliResult<AttributeReport> {
    let registry = AttributeRegistry::baseline();

    let mut requested = Vec::with_capacity(args.required.len() + args.optional.len());
    for name in &args.required {
        requested.push(RequestedAttribute::required(resolve_name(&registry, name)?));
    }
    for name in &args.optional {
        requested.push(RequestedAttribute::optional(resolve_name(&registry, name)?));
    }
    let unsupported = args
        .unsupported
        .iter()
        .map(|name| resolve_name(&registry, name))
        .collect::<CliResult<HashSet<_>>>()?;

    let kept = registry.filter_unsupported(&requested, &unsupported, args.policy.into())?;
    registry.check_representative_exclusivity(&kept)?;
    registry.check_mandatory(&kept)?;

    let dropped = requested
        .into_iter()
        .filter(|a| !kept.contains(a))
        .map(|a| a.name)
        .collect();
    Ok(AttributeReport { kept, dropped })
}

/// Execute the check-attributes command
pub fn execute(args: CheckAttributesArgs) -> CliResult<()> {
    let report = run(&args)?;

    if args.json {
        return print_json(&report);
    }

    println!("Attributes accepted");
    for attribute in &report.kept {
        let marker = if attribute.required { "required" } else { "optional" };
        println!("  {} ({marker})", attribute.name);
    }
    for name in &report.dropped {
        println!("  dropped: {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(required: &[&str], optional: &[&str]) -> CheckAttributesArgs {
        CheckAttributesArgs {
            required: required.iter().map(ToString::to_string).collect(),
            optional: optional.iter().map(ToString::to_string).collect(),
            unsupported: Vec::new(),
            policy: Policy::Drop,
            json: false,
        }
    }

    const NATURAL_MDS: [&str; 4] = [
        "PersonIdentifier",
        "CurrentFamilyName",
        "CurrentGivenName",
        "DateOfBirth",
    ];

    #[test]
    fn test_friendly_names_resolve() {
        let registry = AttributeRegistry::baseline();
        assert_eq!(
            resolve_name(&registry, "DateOfBirth").unwrap(),
            natural_person("DateOfBirth")
        );
        assert_eq!(
            resolve_name(&registry, "LegalName").unwrap(),
            legal_person("LegalName")
        );
        assert_eq!(
            resolve_name(&registry, "RepresentativeLegalName").unwrap(),
            representative_legal_person("LegalName")
        );
        assert!(resolve_name(&registry, "ShoeSize").is_err());
    }

    #[test]
    fn test_complete_minimum_data_set_is_accepted() {
        let report = run(&args(&NATURAL_MDS, &["Gender"])).unwrap();
        assert_eq!(report.kept.len(), 5);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_incomplete_minimum_data_set_is_refused() {
        let err = run(&args(&["PersonIdentifier", "CurrentFamilyName"], &[])).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_unsupported_optional_attribute_is_dropped() {
        let mut request = args(&NATURAL_MDS, &["Gender"]);
        request.unsupported = vec!["Gender".to_string()];

        let report = run(&request).unwrap();
        assert_eq!(report.dropped, vec![natural_person("Gender")]);

        request.policy = Policy::Reject;
        assert!(run(&request).is_err());
    }

    #[test]
    fn test_representative_with_counterpart_is_refused() {
        let request = args(&NATURAL_MDS, &["RepresentativePersonIdentifier"]);
        assert!(matches!(run(&request), Err(CliError::Validation(_))));
    }
}
