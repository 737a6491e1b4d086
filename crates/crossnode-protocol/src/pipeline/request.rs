//! Request paths: inbound validation and outbound preparation.

use super::outcome::{
    ErrorResponseContext, InboundMessage, PreparedRequest, Rejection, Stage, ValidatedRequest,
};
use super::{role_of, same_endpoint, ValidationEngine};
use crate::error::{ProtocolError, ProtocolResult};
use crate::metadata::VerifiedDescriptor;
use crate::models::{
    version, AuthenticationRequest, Binding, LevelOfAssurance, ProtocolVersion, RequestedAttribute,
    Role, SectorType,
};
use crate::negotiation::{self, NegotiationOutcome};
use crate::processor::{processor_for, ProtocolProcessor};
use crossnode_core::{EntityId, MAX_IDENTIFIER_LENGTH};
use tracing::{debug, info, instrument};

impl ValidationEngine {
    /// Validates a request received from a foreign connector.
    ///
    /// Until the signature is verified nothing in the request is trusted, so
    /// failures before that point carry no error response context.
    #[instrument(skip(self, inbound), fields(method = %inbound.method))]
    pub async fn validate_request(
        &self,
        inbound: InboundMessage,
    ) -> Result<ValidatedRequest, Rejection> {
        let request = self
            .codec
            .unmarshal_request(&inbound.payload)
            .map_err(|e| {
                self.reject(
                    Stage::Received,
                    ProtocolError::MalformedMessage(e.to_string()),
                    None,
                )
            })?;
        debug!(request_id = %request.id(), issuer = %request.issuer(), "Request received");

        if self.config.validate_binding
            && !self
                .codec
                .is_binding_acceptable(inbound.method, request.binding())
        {
            let error = ProtocolError::unacceptable_binding(inbound.method, request.binding());
            return Err(self.reject(Stage::BindingChecked, error, None));
        }

        let scope = request
            .origin_country()
            .unwrap_or(request.citizen_country())
            .to_string();
        self.check_freshness(request.id(), request.issued_at())
            .map_err(|e| self.reject(Stage::ReplayChecked, e, None))?;
        self.check_replay(request.id(), &scope)
            .await
            .map_err(|e| self.reject(Stage::ReplayChecked, e, None))?;

        let issuer = self
            .verify_signature(request.issuer(), Role::Requester, &inbound.payload)
            .await
            .map_err(|e| self.reject(Stage::SignatureVerified, e, None))?;

        // From here on the issuer is authenticated; errors go back to the
        // consumer endpoint published in its metadata.
        let published = ErrorResponseContext::for_request(&request).with_destination(
            issuer
                .role(Role::Requester)
                .and_then(|r| r.default_endpoint.clone()),
        );

        let version = self
            .negotiate_version(&issuer)
            .map_err(|e| self.reject(Stage::VersionNegotiated, e, Some(&published)))?;
        // The issuer's own generation decides how its request is read, even
        // when a lower common version was negotiated.
        let processor = processor_for(version::generation_of(&issuer.protocol_versions));

        let request = self
            .validate_inbound_content(request, &issuer)
            .map_err(|e| self.reject(Stage::AttributesValidated, e, Some(&published)))?;
        let context = ErrorResponseContext::for_request(&request);

        check_sector_policy(
            &request,
            issuer.sector_type,
            self.config.requester_id_required,
            processor,
        )
        .map_err(|e| self.reject(Stage::SectorPolicyChecked, e, Some(&context)))?;

        let negotiation = self
            .negotiate_inbound(&request, processor)
            .map_err(|e| self.reject(Stage::LoaNegotiated, e, Some(&context)))?;
        let request = request
            .to_builder()
            .resolved_loa(Some(negotiation.level.clone()))
            .build();

        info!(
            request_id = %request.id(),
            issuer = %request.issuer(),
            version = %version,
            level = %negotiation.level,
            mode = %negotiation.mode,
            "Request accepted"
        );

        Ok(ValidatedRequest {
            request,
            issuer,
            negotiation,
        })
    }

    /// Validates, normalizes, signs and correlates a request a local relying
    /// party sends to a foreign proxy service.
    #[instrument(
        skip(self, request, remote_address),
        fields(request_id = %request.id(), destination = %destination)
    )]
    pub async fn prepare_request(
        &self,
        request: AuthenticationRequest,
        destination: &EntityId,
        remote_address: Option<String>,
    ) -> Result<PreparedRequest, Rejection> {
        let context = ErrorResponseContext::for_request(&request);
        let reject = |stage: Stage, error: ProtocolError| self.reject(stage, error, Some(&context));

        let descriptor = self
            .resolver
            .resolve(destination, Role::Responder, self.config.operation_timeout)
            .await
            .map_err(|e| reject(Stage::MetadataResolved, e))?;

        let version = self
            .negotiate_version(&descriptor)
            .map_err(|e| reject(Stage::VersionNegotiated, e))?;
        let processor = processor_for(version.generation());

        let request = self
            .validate_outbound_content(request, &descriptor)
            .map_err(|e| reject(Stage::AttributesValidated, e))?;

        let flag = self.config.requester_id_required || descriptor.requester_id_flag;
        check_sector_policy(&request, None, flag, processor)
            .map_err(|e| reject(Stage::SectorPolicyChecked, e))?;

        let request = self
            .negotiate_outbound(request, &descriptor, processor)
            .map_err(|e| reject(Stage::LoaNegotiated, e))?;

        let endpoint = outbound_endpoint(&request, &descriptor);
        let request = request
            .to_builder()
            .destination(endpoint.clone())
            .protocol_version(Some(version.to_string()))
            .build();

        let payload = self
            .codec
            .marshal_request(&request)
            .and_then(|encoded| self.codec.sign(encoded))
            .map_err(|e| reject(Stage::Correlated, ProtocolError::Internal(e.to_string())))?;

        self.bounded(
            "correlation",
            self.correlation.put_for_peer(
                request.id(),
                request.clone(),
                descriptor.entity_id.clone(),
                remote_address,
            ),
        )
        .await
        .map_err(|e| reject(Stage::Correlated, e))?;

        info!(
            request_id = %request.id(),
            destination = %destination,
            version = %version,
            "Request prepared"
        );

        Ok(PreparedRequest {
            request,
            payload,
            endpoint,
            generation: version.generation(),
            destination: descriptor,
        })
    }

    /// Highest version both sides speak.
    ///
    /// A peer that advertises no recognized version is treated as legacy.
    fn negotiate_version(&self, peer: &VerifiedDescriptor) -> ProtocolResult<ProtocolVersion> {
        let mut remote = version::recognized_versions(&peer.protocol_versions);
        if remote.is_empty() {
            remote.push(ProtocolVersion::V1_1);
        }
        version::recognized_versions(&self.config.protocol_versions)
            .into_iter()
            .find(|v| remote.contains(v))
            .ok_or_else(|| ProtocolError::ProtocolVersionUnsupported {
                local: self.config.protocol_versions.clone(),
                remote: peer.protocol_versions.clone(),
            })
    }

    fn validate_inbound_content(
        &self,
        request: AuthenticationRequest,
        issuer: &VerifiedDescriptor,
    ) -> ProtocolResult<AuthenticationRequest> {
        let served = &self.config.local_endpoints;
        if !served.is_empty()
            && !served
                .iter()
                .any(|endpoint| same_endpoint(endpoint, request.destination()))
        {
            return Err(ProtocolError::InvalidDestination(
                request.destination().to_string(),
            ));
        }

        let consumer_url = consumer_endpoint(&request, issuer)?;

        if let Some(format) = request.name_id_format() {
            if !self.config.name_id_formats.iter().any(|f| f == format) {
                return Err(ProtocolError::InvalidNameIdFormat(format.to_string()));
            }
        }

        let attributes = self.check_attributes(&request)?;

        Ok(request
            .to_builder()
            .attributes(attributes)
            .assertion_consumer_url(Some(consumer_url))
            .build())
    }

    fn validate_outbound_content(
        &self,
        request: AuthenticationRequest,
        destination: &VerifiedDescriptor,
    ) -> ProtocolResult<AuthenticationRequest> {
        if let Some(format) = request.name_id_format() {
            let responder = role_of(destination, Role::Responder)?;
            let local = self.config.name_id_formats.iter().any(|f| f == format);
            let remote = responder.name_id_formats.is_empty()
                || responder.name_id_formats.iter().any(|f| f == format);
            if !local || !remote {
                return Err(ProtocolError::InvalidNameIdFormat(format.to_string()));
            }
        }

        let attributes = self.check_attributes(&request)?;
        Ok(request.to_builder().attributes(attributes).build())
    }

    /// Applies the attribute policy, returning the attributes to keep.
    fn check_attributes(
        &self,
        request: &AuthenticationRequest,
    ) -> ProtocolResult<Vec<RequestedAttribute>> {
        let kept = self.attributes.filter_unsupported(
            request.requested_attributes(),
            &self.config.unsupported_attributes,
            self.config.unsupported_attribute_policy,
        )?;
        self.attributes.check_representative_exclusivity(&kept)?;
        self.attributes.check_mandatory(&kept)?;
        Ok(kept)
    }

    fn negotiate_inbound(
        &self,
        request: &AuthenticationRequest,
        processor: &dyn ProtocolProcessor,
    ) -> ProtocolResult<NegotiationOutcome> {
        negotiation::validate_requested_loas(
            request.levels_of_assurance(),
            request.loa_comparison(),
        )?;
        let outcome =
            negotiation::negotiate(&self.config.published_loas, processor.compatibility_mode())?;
        if !negotiation::is_equal_or_better(
            request.levels_of_assurance(),
            &self.config.published_loas,
        ) {
            return Err(ProtocolError::InvalidLoa(
                "no published level satisfies the request".to_string(),
            ));
        }
        Ok(outcome)
    }

    fn negotiate_outbound(
        &self,
        request: AuthenticationRequest,
        destination: &VerifiedDescriptor,
        processor: &dyn ProtocolProcessor,
    ) -> ProtocolResult<AuthenticationRequest> {
        negotiation::validate_requested_loas(
            request.levels_of_assurance(),
            request.loa_comparison(),
        )?;
        if !negotiation::is_equal_or_better(
            request.levels_of_assurance(),
            &destination.assurance_levels,
        ) {
            return Err(ProtocolError::InvalidLoa(format!(
                "{} publishes no level satisfying the request",
                destination.entity_id
            )));
        }

        let request = processor.normalize_outbound(request)?;
        let minimum = negotiation::min_notified(request.levels_of_assurance())
            .map(LevelOfAssurance::from)
            .or_else(|| request.levels_of_assurance().first().cloned());
        Ok(request.to_builder().resolved_loa(minimum).build())
    }
}

/// The consumer endpoint a request is answered at.
///
/// A declared endpoint must be one the issuer publishes; an absent one is
/// taken from the issuer's metadata.
fn consumer_endpoint(
    request: &AuthenticationRequest,
    issuer: &VerifiedDescriptor,
) -> ProtocolResult<String> {
    let requester = role_of(issuer, Role::Requester)?;
    let published: Vec<&str> = requester
        .default_endpoint
        .iter()
        .map(String::as_str)
        .chain(requester.endpoints.iter().map(|e| e.location.as_str()))
        .collect();

    match request.assertion_consumer_url() {
        Some(actual) if published.iter().any(|p| same_endpoint(p, actual)) => {
            Ok(actual.to_string())
        }
        Some(actual) => Err(ProtocolError::InvalidConsumerEndpoint {
            expected: if published.is_empty() {
                "none published".to_string()
            } else {
                published.join(", ")
            },
            actual: actual.to_string(),
        }),
        None => requester
            .default_endpoint
            .clone()
            .or_else(|| {
                requester
                    .endpoint_for(request.binding().unwrap_or(Binding::HttpPost))
                    .map(String::from)
            })
            .ok_or_else(|| ProtocolError::InvalidConsumerEndpoint {
                expected: "none published".to_string(),
                actual: "none".to_string(),
            }),
    }
}

/// Where an outbound request is sent: the endpoint the destination
/// publishes for the request's binding, then its default endpoint, then
/// the destination already on the request.
fn outbound_endpoint(request: &AuthenticationRequest, destination: &VerifiedDescriptor) -> String {
    destination
        .role(Role::Responder)
        .and_then(|responder| {
            request
                .binding()
                .and_then(|b| responder.endpoint_for(b))
                .or(responder.default_endpoint.as_deref())
        })
        .map_or_else(|| request.destination().to_string(), String::from)
}

/// Requester-id rule for private-sector requests.
///
/// A present requester id is always checked; an absent one is an error
/// only when the peer's processor requires it.
fn check_sector_policy(
    request: &AuthenticationRequest,
    fallback_sector: Option<SectorType>,
    flag: bool,
    processor: &dyn ProtocolProcessor,
) -> ProtocolResult<()> {
    if let Some(requester_id) = request.requester_id() {
        return validate_requester_id(requester_id);
    }
    let sector = request.sector_type().or(fallback_sector);
    if processor.requires_requester_id(sector, flag) {
        return Err(ProtocolError::MissingRequesterId);
    }
    Ok(())
}

fn validate_requester_id(value: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidRequesterId("empty".to_string()));
    }
    if value.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ProtocolError::InvalidRequesterId(format!(
            "longer than {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProtocolError::InvalidRequesterId(
            "contains whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotifiedLevel;

    fn request(sector: Option<SectorType>, requester_id: Option<&str>) -> AuthenticationRequest {
        AuthenticationRequest::builder(
            "_r".parse().unwrap(),
            "https://sp.example/metadata".parse().unwrap(),
            "https://ps.example/sso",
            "BE".parse().unwrap(),
        )
        .levels_of_assurance(vec![NotifiedLevel::High.into()])
        .sector_type(sector)
        .requester_id(requester_id.map(String::from))
        .build()
    }

    #[test]
    fn test_requester_id_values() {
        assert!(validate_requester_id("REQ-123").is_ok());
        assert!(validate_requester_id("https://sp.example/requester").is_ok());
        assert!(validate_requester_id("  ").is_err());
        assert!(validate_requester_id("REQ 123").is_err());
        assert!(validate_requester_id(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_sector_policy() {
        let current = processor_for(crate::models::ProtocolGeneration::Current);
        let legacy = processor_for(crate::models::ProtocolGeneration::Legacy);
        let private = request(Some(SectorType::Private), None);

        assert_eq!(
            check_sector_policy(&private, None, true, current),
            Err(ProtocolError::MissingRequesterId)
        );
        assert!(check_sector_policy(&private, None, false, current).is_ok());
        assert!(check_sector_policy(&private, None, true, legacy).is_ok());

        let with_id = request(Some(SectorType::Private), Some("REQ-123"));
        assert!(check_sector_policy(&with_id, None, true, current).is_ok());

        // Sector falls back to the peer's declared sector.
        let unspecified = request(None, None);
        assert_eq!(
            check_sector_policy(&unspecified, Some(SectorType::Private), true, current),
            Err(ProtocolError::MissingRequesterId)
        );
    }
}
