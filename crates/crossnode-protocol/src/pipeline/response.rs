//! Response path: inbound responses matched against their requests.

use super::outcome::{ErrorResponseContext, InboundMessage, Rejection, Stage, ValidatedResponse};
use super::{same_endpoint, ValidationEngine};
use crate::attributes::{
    legal_person, natural_person, representative_legal_person, representative_natural_person,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::metadata::VerifiedDescriptor;
use crate::models::{AuthenticationRequest, AuthenticationResponse, Role};
use crate::negotiation;
use crossnode_core::CountryCode;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

/// Unique identifier shape: `XX/YY/value`, issuing country first.
static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2}/[A-Z]{2}/.+$").expect("IDENTIFIER_PATTERN is a valid regex pattern")
});

impl ValidationEngine {
    /// Validates a response from a foreign proxy service and consumes the
    /// correlation entry of the request it answers.
    ///
    /// Failure responses that pass authentication and correlation are
    /// accepted as they are, for the caller to relay.
    #[instrument(skip(self, inbound), fields(method = %inbound.method))]
    pub async fn validate_response(
        &self,
        inbound: InboundMessage,
    ) -> Result<ValidatedResponse, Rejection> {
        let response = self
            .codec
            .unmarshal_response(&inbound.payload)
            .map_err(|e| {
                self.reject(
                    Stage::Received,
                    ProtocolError::MalformedMessage(e.to_string()),
                    None,
                )
            })?;
        debug!(
            response_id = %response.id(),
            in_response_to = %response.in_response_to(),
            issuer = %response.issuer(),
            "Response received"
        );

        if self.config.validate_binding
            && !self
                .codec
                .is_binding_acceptable(inbound.method, response.binding())
        {
            let error = ProtocolError::unacceptable_binding(inbound.method, response.binding());
            return Err(self.reject(Stage::BindingChecked, error, None));
        }

        let scope = response
            .country()
            .map_or_else(|| response.issuer().to_string(), ToString::to_string);
        self.check_freshness(response.id(), response.issued_at())
            .map_err(|e| self.reject(Stage::ReplayChecked, e, None))?;
        self.check_replay(response.id(), &scope)
            .await
            .map_err(|e| self.reject(Stage::ReplayChecked, e, None))?;

        let responder = self
            .verify_signature(response.issuer(), Role::Responder, &inbound.payload)
            .await
            .map_err(|e| self.reject(Stage::SignatureVerified, e, None))?;

        let entry = self
            .bounded(
                "correlation",
                self.correlation
                    .take_from(response.in_response_to(), response.issuer()),
            )
            .await
            .map_err(|e| self.reject(Stage::Correlated, e, None))?;
        let request = entry.request;
        let context = ErrorResponseContext::for_request(&request);

        check_audience(&response, &request)
            .map_err(|e| self.reject(Stage::AudienceValidated, e, Some(&context)))?;

        self.check_response(&response, &request, &responder)
            .map_err(|e| self.reject(Stage::ResponseChecked, e, Some(&context)))?;

        info!(
            response_id = %response.id(),
            in_response_to = %response.in_response_to(),
            success = response.status().is_success(),
            level = ?response.level_of_assurance().map(ToString::to_string),
            "Response accepted"
        );

        Ok(ValidatedResponse {
            response,
            request,
            remote_address: entry.remote_address,
            responder,
        })
    }

    fn check_response(
        &self,
        response: &AuthenticationResponse,
        request: &AuthenticationRequest,
        responder: &VerifiedDescriptor,
    ) -> ProtocolResult<()> {
        if let Some(destination) = response.destination() {
            let served = &self.config.local_endpoints;
            if !served.is_empty() && !served.iter().any(|e| same_endpoint(e, destination)) {
                return Err(ProtocolError::InvalidDestination(destination.to_string()));
            }
        }

        if self.config.check_response_country {
            let expected = request.citizen_country();
            match response.country().or(responder.node_country.as_ref()) {
                Some(country) if country == expected => {}
                other => {
                    return Err(ProtocolError::InvalidResponseCountry {
                        expected: expected.to_string(),
                        actual: other.map_or_else(|| "none".to_string(), ToString::to_string),
                    });
                }
            }
        }

        if !response.status().is_success() {
            return Ok(());
        }

        let granted = response.level_of_assurance().ok_or_else(|| {
            ProtocolError::InvalidResponseLoa("no level of assurance granted".to_string())
        })?;
        let granted = std::slice::from_ref(granted);
        if !negotiation::is_equal_or_better(request.levels_of_assurance(), granted) {
            return Err(ProtocolError::InvalidResponseLoa(granted[0].to_string()));
        }
        if !negotiation::has_common_loa(granted, &responder.assurance_levels) {
            return Err(ProtocolError::UnpublishedResponseLoa(granted[0].to_string()));
        }

        if self.config.validate_identifier_prefix {
            check_identifiers(response, request.citizen_country())?;
        }
        Ok(())
    }
}

/// The response must be addressed to the party that issued the request.
fn check_audience(
    response: &AuthenticationResponse,
    request: &AuthenticationRequest,
) -> ProtocolResult<()> {
    let expected = request.issuer().as_str();
    match response.audience() {
        Some(audience) if audience == expected => Ok(()),
        other => Err(ProtocolError::InvalidAudience {
            expected: expected.to_string(),
            actual: other.unwrap_or("none").to_string(),
        }),
    }
}

/// Unique identifiers follow `XX/YY/value` and are issued by the citizen's
/// country. Errors name the attribute, never the value.
fn check_identifiers(
    response: &AuthenticationResponse,
    citizen_country: &CountryCode,
) -> ProtocolResult<()> {
    let names = [
        natural_person("PersonIdentifier"),
        legal_person("LegalPersonIdentifier"),
        representative_natural_person("PersonIdentifier"),
        representative_legal_person("LegalPersonIdentifier"),
    ];
    for name in &names {
        let valid = response.attribute_values(name).iter().all(|value| {
            IDENTIFIER_PATTERN.is_match(value) && value.starts_with(citizen_country.as_str())
        });
        if !valid {
            return Err(ProtocolError::InvalidIdentifierFormat(name.clone()));
        }
    }
    Ok(())
}
