//! Attribute policy validation.
//!
//! The registry knows every attribute the node can handle, the person type
//! it describes and whether it belongs to the mandatory baseline of that
//! person type.
//!
//! Rules applied to a request:
//! - at least one natural-person or legal-person attribute is requested
//! - for each person type requested, its whole baseline is requested
//! - a representative attribute never comes with its own counterpart
//! - unsupported attributes are refused when required and, when optional,
//!   dropped or refused according to [`UnsupportedAttributePolicy`]

use crate::error::{ProtocolError, ProtocolResult};
use crate::models::RequestedAttribute;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::debug;

const NATURAL_PREFIX: &str = "http://eidas.europa.eu/attributes/naturalperson/";
const LEGAL_PREFIX: &str = "http://eidas.europa.eu/attributes/legalperson/";
const REPRESENTATIVE_SEGMENT: &str = "representative/";

/// Natural-person attributes as (friendly name, mandatory).
const NATURAL_PERSON: &[(&str, bool)] = &[
    ("PersonIdentifier", true),
    ("CurrentFamilyName", true),
    ("CurrentGivenName", true),
    ("DateOfBirth", true),
    ("BirthName", false),
    ("PlaceOfBirth", false),
    ("CurrentAddress", false),
    ("Gender", false),
];

/// Legal-person attributes as (friendly name, mandatory).
const LEGAL_PERSON: &[(&str, bool)] = &[
    ("LegalPersonIdentifier", true),
    ("LegalName", true),
    ("LegalPersonAddress", false),
    ("VATRegistrationNumber", false),
    ("TaxReference", false),
    ("D-2012-17-EUIdentifier", false),
    ("LEI", false),
    ("EORI", false),
    ("SEED", false),
    ("SIC", false),
];

/// Person type an attribute describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    NaturalPerson,
    LegalPerson,
    RepresentativeNaturalPerson,
    RepresentativeLegalPerson,
}

impl PersonType {
    /// The represented person type of a representative type.
    #[must_use]
    pub fn counterpart(&self) -> Option<PersonType> {
        match self {
            Self::RepresentativeNaturalPerson => Some(Self::NaturalPerson),
            Self::RepresentativeLegalPerson => Some(Self::LegalPerson),
            Self::NaturalPerson | Self::LegalPerson => None,
        }
    }

    #[must_use]
    pub fn is_representative(&self) -> bool {
        self.counterpart().is_some()
    }
}

impl Display for PersonType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NaturalPerson => f.write_str("natural person"),
            Self::LegalPerson => f.write_str("legal person"),
            Self::RepresentativeNaturalPerson => f.write_str("representative natural person"),
            Self::RepresentativeLegalPerson => f.write_str("representative legal person"),
        }
    }
}

/// What to do with an optional attribute the node does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedAttributePolicy {
    /// Remove it from the request and continue.
    #[default]
    Drop,
    /// Refuse the request.
    Reject,
}

impl FromStr for UnsupportedAttributePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown unsupported-attribute policy: {other}")),
        }
    }
}

/// A known attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Name URI.
    pub name: String,
    pub friendly_name: String,
    pub person_type: PersonType,
    /// Part of the baseline of its person type.
    pub mandatory: bool,
    /// Name of the represented-person attribute, for representative attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
}

/// Registry of known attributes.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    definitions: HashMap<String, AttributeDefinition>,
}

impl AttributeRegistry {
    /// Registry with the minimum data sets of all four person types.
    #[must_use]
    pub fn baseline() -> Self {
        let mut registry = Self::default();
        for (prefix, person_type, set) in [
            (NATURAL_PREFIX, PersonType::NaturalPerson, NATURAL_PERSON),
            (LEGAL_PREFIX, PersonType::LegalPerson, LEGAL_PERSON),
        ] {
            for (friendly, mandatory) in set {
                let name = format!("{prefix}{friendly}");
                registry.insert(AttributeDefinition {
                    name: format!("{prefix}{REPRESENTATIVE_SEGMENT}{friendly}"),
                    friendly_name: format!("Representative{friendly}"),
                    person_type: match person_type {
                        PersonType::NaturalPerson => PersonType::RepresentativeNaturalPerson,
                        _ => PersonType::RepresentativeLegalPerson,
                    },
                    mandatory: *mandatory,
                    counterpart: Some(name.clone()),
                });
                registry.insert(AttributeDefinition {
                    name,
                    friendly_name: (*friendly).to_string(),
                    person_type,
                    mandatory: *mandatory,
                    counterpart: None,
                });
            }
        }
        registry
    }

    /// Adds or replaces a definition.
    pub fn insert(&mut self, definition: AttributeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name)
    }

    /// Baseline attribute names of a person type, sorted.
    pub fn mandatory_names(&self, person_type: PersonType) -> BTreeSet<&str> {
        self.definitions
            .values()
            .filter(|d| d.person_type == person_type && d.mandatory)
            .map(|d| d.name.as_str())
            .collect()
    }

    fn person_types(&self, attributes: &[RequestedAttribute]) -> BTreeSet<PersonType> {
        attributes
            .iter()
            .filter_map(|a| self.get(&a.name))
            .map(|d| d.person_type)
            .collect()
    }

    /// Checks that the baseline of every requested person type is requested.
    ///
    /// # Errors
    ///
    /// `MissingMandatoryAttributes` when the set is empty, when neither a
    /// natural nor a legal person is requested, or when a baseline is
    /// incomplete.
    pub fn check_mandatory(&self, attributes: &[RequestedAttribute]) -> ProtocolResult<()> {
        if attributes.is_empty() {
            return Err(ProtocolError::MissingMandatoryAttributes {
                missing: vec!["no attributes requested".to_string()],
            });
        }

        let person_types = self.person_types(attributes);
        if !person_types.contains(&PersonType::NaturalPerson)
            && !person_types.contains(&PersonType::LegalPerson)
        {
            let mut missing: Vec<String> = self
                .mandatory_names(PersonType::NaturalPerson)
                .into_iter()
                .map(String::from)
                .collect();
            missing.extend(
                self.mandatory_names(PersonType::LegalPerson)
                    .into_iter()
                    .map(String::from),
            );
            return Err(ProtocolError::MissingMandatoryAttributes { missing });
        }

        let requested: HashSet<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        let missing: Vec<String> = person_types
            .iter()
            .flat_map(|pt| self.mandatory_names(*pt))
            .filter(|name| !requested.contains(name))
            .map(String::from)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::MissingMandatoryAttributes { missing })
        }
    }

    /// Refuses a representative attribute requested together with its
    /// represented-person counterpart.
    pub fn check_representative_exclusivity(
        &self,
        attributes: &[RequestedAttribute],
    ) -> ProtocolResult<()> {
        let requested: HashSet<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        for attribute in attributes {
            let Some(counterpart) = self
                .get(&attribute.name)
                .and_then(|d| d.counterpart.as_deref())
            else {
                continue;
            };
            if requested.contains(counterpart) {
                return Err(ProtocolError::RepresentativeAttributeConflict {
                    representative: attribute.name.clone(),
                    counterpart: counterpart.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Removes or refuses unsupported attributes.
    ///
    /// An attribute is unsupported when it is unknown to the registry or
    /// listed in `unsupported`. Returns the attributes to keep.
    pub fn filter_unsupported(
        &self,
        attributes: &[RequestedAttribute],
        unsupported: &HashSet<String>,
        policy: UnsupportedAttributePolicy,
    ) -> ProtocolResult<Vec<RequestedAttribute>> {
        let mut kept = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            let supported =
                self.get(&attribute.name).is_some() && !unsupported.contains(&attribute.name);
            if supported {
                kept.push(attribute.clone());
                continue;
            }
            if attribute.required {
                return Err(ProtocolError::UnsupportedMandatoryAttribute(
                    attribute.name.clone(),
                ));
            }
            match policy {
                UnsupportedAttributePolicy::Reject => {
                    return Err(ProtocolError::UnsupportedAttribute(attribute.name.clone()));
                }
                UnsupportedAttributePolicy::Drop => {
                    debug!(attribute = %attribute.name, "Dropping unsupported optional attribute");
                }
            }
        }
        Ok(kept)
    }
}

/// Name URI of a natural-person attribute.
#[must_use]
pub fn natural_person(friendly_name: &str) -> String {
    format!("{NATURAL_PREFIX}{friendly_name}")
}

/// Name URI of a legal-person attribute.
#[must_use]
pub fn legal_person(friendly_name: &str) -> String {
    format!("{LEGAL_PREFIX}{friendly_name}")
}

/// Name URI of a representative natural-person attribute.
#[must_use]
pub fn representative_natural_person(friendly_name: &str) -> String {
    format!("{NATURAL_PREFIX}{REPRESENTATIVE_SEGMENT}{friendly_name}")
}

/// Name URI of a representative legal-person attribute.
#[must_use]
pub fn representative_legal_person(friendly_name: &str) -> String {
    format!("{LEGAL_PREFIX}{REPRESENTATIVE_SEGMENT}{friendly_name}")
}
