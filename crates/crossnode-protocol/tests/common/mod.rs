//! Shared fixtures for the protocol engine integration tests.
//!
//! Messages travel as JSON envelopes. "Signing" stamps the envelope with the
//! signer's certificate name and verification checks that name against the
//! certificates published in the sender's metadata, which is enough to
//! exercise every trust decision of the pipeline without real keys.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use crossnode_core::EntityId;
use crossnode_protocol::attributes::{legal_person, natural_person};
use crossnode_protocol::metadata::{PinnedDigestVerifier, StaticMetadataFetcher};
use crossnode_protocol::models::{
    AuthenticationRequest, AuthenticationRequestBuilder, AuthenticationResponse,
    AuthenticationResponseBuilder, Binding, CertificateRef, Endpoint, LevelOfAssurance,
    NotifiedLevel, RequestedAttribute, ResponseStatus, Role, RoleDescriptor, SectorType,
    TrustDescriptor,
};
use crossnode_protocol::pipeline::InboundMessage;
use crossnode_protocol::{
    Clock, CodecError, EngineConfig, HttpMethod, ManualClock, MessageCodec,
    MetadataTrustResolver, NodeRole, ValidationEngine,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub const PROXY_SERVICE: &str = "https://ps.example/metadata";
pub const PROXY_SERVICE_SSO: &str = "https://ps.example/sso";
pub const LEGACY_PROXY_SERVICE: &str = "https://legacy-ps.example/metadata";
pub const LEGACY_PROXY_SERVICE_SSO: &str = "https://legacy-ps.example/sso";

pub const SP: &str = "https://sp.example/metadata";
pub const SP_ACS: &str = "https://sp.example/acs";
pub const LEGACY_SP: &str = "https://legacy.example/metadata";
pub const LEGACY_SP_ACS: &str = "https://legacy.example/acs";

pub const CONNECTOR: &str = "https://connector.example/metadata";
pub const CONNECTOR_ACS: &str = "https://connector.example/acs";

pub const PS_KEY: &str = "cert-ps";
pub const LEGACY_PS_KEY: &str = "cert-legacy-ps";
pub const SP_KEY: &str = "cert-sp";
pub const LEGACY_SP_KEY: &str = "cert-legacy-sp";
pub const CONNECTOR_KEY: &str = "cert-connector";

// ============================================================
// Codec
// ============================================================

#[derive(Serialize, Deserialize)]
struct Envelope {
    body: serde_json::Value,
    #[serde(default)]
    signature: Option<String>,
}

/// JSON codec signing with a named test key.
pub struct TestCodec {
    key: String,
    signed: AtomicUsize,
}

impl TestCodec {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            signed: AtomicUsize::new(0),
        }
    }

    pub fn signed_count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }

    fn envelope(payload: &[u8]) -> Result<Envelope, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        let body = serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))?;
        serde_json::to_vec(&Envelope {
            body,
            signature: None,
        })
        .map_err(|e| CodecError::Encode(e.to_string()))
    }
}

impl MessageCodec for TestCodec {
    fn unmarshal_request(&self, payload: &[u8]) -> Result<AuthenticationRequest, CodecError> {
        serde_json::from_value(Self::envelope(payload)?.body)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn marshal_request(&self, request: &AuthenticationRequest) -> Result<Vec<u8>, CodecError> {
        Self::encode(request)
    }

    fn unmarshal_response(&self, payload: &[u8]) -> Result<AuthenticationResponse, CodecError> {
        serde_json::from_value(Self::envelope(payload)?.body)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn marshal_response(&self, response: &AuthenticationResponse) -> Result<Vec<u8>, CodecError> {
        Self::encode(response)
    }

    fn sign(&self, payload: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut envelope = Self::envelope(&payload)?;
        envelope.signature = Some(self.key.clone());
        self.signed.fetch_add(1, Ordering::SeqCst);
        serde_json::to_vec(&envelope).map_err(|e| CodecError::Signing(e.to_string()))
    }

    fn verify(&self, payload: &[u8], certificates: &[CertificateRef]) -> Result<(), CodecError> {
        match Self::envelope(payload)?.signature {
            Some(signer) if certificates.iter().any(|c| c.0 == signer) => Ok(()),
            Some(signer) => Err(CodecError::Signature(format!("unknown signer {signer}"))),
            None => Err(CodecError::Signature("message is not signed".to_string())),
        }
    }

    fn encrypt(
        &self,
        payload: Vec<u8>,
        _certificates: &[CertificateRef],
    ) -> Result<Vec<u8>, CodecError> {
        Ok(payload)
    }

    fn is_binding_acceptable(&self, method: HttpMethod, declared: Option<Binding>) -> bool {
        declared.map_or(method == HttpMethod::Post, |b| b.expected_method() == method)
    }
}

// ============================================================
// Metadata
// ============================================================

fn role(role: Role, endpoint: &str, binding: Binding, key: &str) -> RoleDescriptor {
    RoleDescriptor {
        role,
        default_endpoint: Some(endpoint.to_string()),
        endpoints: vec![Endpoint {
            binding,
            location: endpoint.to_string(),
        }],
        signing_certificates: vec![CertificateRef(key.to_string())],
        encryption_certificates: vec![CertificateRef(key.to_string())],
        name_id_formats: Vec::new(),
    }
}

/// A connector on protocol 1.2 that asks for requester ids.
pub fn current_requester() -> TrustDescriptor {
    TrustDescriptor {
        entity_id: SP.parse().unwrap(),
        roles: vec![role(Role::Requester, SP_ACS, Binding::HttpPost, SP_KEY)],
        assurance_levels: Vec::new(),
        protocol_versions: vec!["1.2".to_string(), "1.1".to_string()],
        requester_id_flag: true,
        sector_type: None,
        node_country: Some("FR".parse().unwrap()),
        cache_duration_secs: None,
        valid_until: None,
    }
}

/// A connector that only speaks protocol 1.1.
pub fn legacy_requester() -> TrustDescriptor {
    TrustDescriptor {
        entity_id: LEGACY_SP.parse().unwrap(),
        roles: vec![role(
            Role::Requester,
            LEGACY_SP_ACS,
            Binding::HttpPost,
            LEGACY_SP_KEY,
        )],
        assurance_levels: Vec::new(),
        protocol_versions: vec!["1.1".to_string()],
        requester_id_flag: true,
        sector_type: None,
        node_country: Some("FR".parse().unwrap()),
        cache_duration_secs: None,
        valid_until: None,
    }
}

/// A proxy service for Belgian citizens on protocol 1.2.
pub fn current_responder() -> TrustDescriptor {
    TrustDescriptor {
        entity_id: PROXY_SERVICE.parse().unwrap(),
        roles: vec![role(
            Role::Responder,
            PROXY_SERVICE_SSO,
            Binding::HttpPost,
            PS_KEY,
        )],
        assurance_levels: vec![NotifiedLevel::High.into(), NotifiedLevel::Substantial.into()],
        protocol_versions: vec!["1.2".to_string(), "1.1".to_string()],
        requester_id_flag: false,
        sector_type: None,
        node_country: Some("BE".parse().unwrap()),
        cache_duration_secs: None,
        valid_until: None,
    }
}

/// A proxy service for Belgian citizens that only speaks protocol 1.1.
pub fn legacy_responder() -> TrustDescriptor {
    TrustDescriptor {
        entity_id: LEGACY_PROXY_SERVICE.parse().unwrap(),
        roles: vec![role(
            Role::Responder,
            LEGACY_PROXY_SERVICE_SSO,
            Binding::HttpPost,
            LEGACY_PS_KEY,
        )],
        assurance_levels: vec![NotifiedLevel::High.into()],
        protocol_versions: vec!["1.1".to_string()],
        requester_id_flag: false,
        sector_type: None,
        node_country: Some("BE".parse().unwrap()),
        cache_duration_secs: None,
        valid_until: None,
    }
}

/// Resolver serving pinned documents for the given descriptors.
pub fn resolver(
    descriptors: &[TrustDescriptor],
    clock: Arc<ManualClock>,
) -> (MetadataTrustResolver, Arc<StaticMetadataFetcher>) {
    let mut fetcher = StaticMetadataFetcher::new();
    let mut verifier = PinnedDigestVerifier::new();
    for descriptor in descriptors {
        let body = serde_json::to_vec(descriptor).unwrap();
        let url = descriptor.entity_id.to_string();
        verifier = verifier.pin(url.clone(), PinnedDigestVerifier::digest(&body));
        fetcher = fetcher.with_document(url, body);
    }
    let fetcher = Arc::new(fetcher);
    let resolver = MetadataTrustResolver::new(
        fetcher.clone(),
        Arc::new(verifier),
        Duration::from_secs(3600),
    )
    .with_clock(clock);
    (resolver, fetcher)
}

// ============================================================
// Engines
// ============================================================

pub struct Harness {
    pub engine: ValidationEngine,
    pub clock: Arc<ManualClock>,
    pub fetcher: Arc<StaticMetadataFetcher>,
}

impl Harness {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Proxy service configuration for Belgium publishing `published`, with the
/// requester-id policy enabled.
pub fn proxy_service_config(published: Vec<LevelOfAssurance>) -> EngineConfig {
    let mut config = EngineConfig::new(
        PROXY_SERVICE.parse().unwrap(),
        NodeRole::ProxyService,
        published,
    );
    config.node_country = Some("BE".parse().unwrap());
    config.local_endpoints = vec![PROXY_SERVICE_SSO.to_string()];
    config.requester_id_required = true;
    config
}

pub fn connector_config() -> EngineConfig {
    let mut config = EngineConfig::new(
        CONNECTOR.parse().unwrap(),
        NodeRole::Connector,
        vec![NotifiedLevel::High.into()],
    );
    config.node_country = Some("FR".parse().unwrap());
    config.local_endpoints = vec![CONNECTOR_ACS.to_string()];
    config
}

/// Initialize logging for tests (once), honoring RUST_LOG when set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn harness(config: EngineConfig, peers: &[TrustDescriptor], key: &str) -> Harness {
    init_test_logging();
    let clock = Arc::new(ManualClock::default());
    let (resolver, fetcher) = resolver(peers, clock.clone());
    let engine = ValidationEngine::builder(config, Arc::new(TestCodec::new(key)), resolver)
        .clock(clock.clone())
        .build()
        .unwrap();
    Harness {
        engine,
        clock,
        fetcher,
    }
}

/// Proxy service trusting one current and one legacy connector.
pub fn proxy_service(published: Vec<LevelOfAssurance>) -> Harness {
    harness(
        proxy_service_config(published),
        &[current_requester(), legacy_requester()],
        PS_KEY,
    )
}

/// Connector trusting one current and one legacy proxy service.
pub fn connector() -> Harness {
    harness(
        connector_config(),
        &[current_responder(), legacy_responder()],
        CONNECTOR_KEY,
    )
}

// ============================================================
// Messages
// ============================================================

/// The natural-person minimum data set, all required.
pub fn natural_person_attributes() -> Vec<RequestedAttribute> {
    ["PersonIdentifier", "CurrentFamilyName", "CurrentGivenName", "DateOfBirth"]
        .into_iter()
        .map(|name| RequestedAttribute::required(natural_person(name)))
        .collect()
}

pub fn legal_person_attributes() -> Vec<RequestedAttribute> {
    ["LegalPersonIdentifier", "LegalName"]
        .into_iter()
        .map(|name| RequestedAttribute::required(legal_person(name)))
        .collect()
}

/// A request for a Belgian citizen's natural-person data at SUBSTANTIAL.
pub fn request(
    id: &str,
    issuer: &str,
    destination: &str,
    issued_at: DateTime<Utc>,
) -> AuthenticationRequestBuilder {
    AuthenticationRequest::builder(
        id.parse().unwrap(),
        issuer.parse().unwrap(),
        destination,
        "BE".parse().unwrap(),
    )
    .attributes(natural_person_attributes())
    .levels_of_assurance(vec![NotifiedLevel::Substantial.into()])
    .sector_type(Some(SectorType::Public))
    .binding(Some(Binding::HttpPost))
    .relay_state(Some("relay-1".to_string()))
    .issued_at(issued_at)
}

/// A request from the current connector to this proxy service.
pub fn inbound_request(id: &str, issued_at: DateTime<Utc>) -> AuthenticationRequestBuilder {
    request(id, SP, PROXY_SERVICE_SSO, issued_at)
}

/// A request from a local relying party leaving through the connector.
pub fn outbound_request(id: &str, issued_at: DateTime<Utc>) -> AuthenticationRequestBuilder {
    request(id, CONNECTOR, PROXY_SERVICE_SSO, issued_at)
        .assertion_consumer_url(Some(CONNECTOR_ACS.to_string()))
}

/// A successful HIGH response from the proxy service to `request`.
pub fn response_to(
    id: &str,
    request: &AuthenticationRequest,
    issued_at: DateTime<Utc>,
) -> AuthenticationResponseBuilder {
    AuthenticationResponse::builder(
        id.parse().unwrap(),
        request.id().clone(),
        PROXY_SERVICE.parse().unwrap(),
        ResponseStatus::Success,
    )
    .destination(Some(CONNECTOR_ACS.to_string()))
    .audience(Some(request.issuer().to_string()))
    .country(Some("BE".parse().unwrap()))
    .level_of_assurance(Some(NotifiedLevel::High.into()))
    .attribute(
        natural_person("PersonIdentifier"),
        vec!["BE/FR/0123456789".to_string()],
    )
    .binding(Some(Binding::HttpPost))
    .issued_at(issued_at)
}

/// Encodes and signs a request with `key`, as a POST.
pub fn signed_request(request: &AuthenticationRequest, key: &str) -> InboundMessage {
    let codec = TestCodec::new(key);
    let payload = codec.sign(codec.marshal_request(request).unwrap()).unwrap();
    InboundMessage::new(HttpMethod::Post, payload)
}

/// Encodes and signs a response with `key`, as a POST.
pub fn signed_response(response: &AuthenticationResponse, key: &str) -> InboundMessage {
    let codec = TestCodec::new(key);
    let payload = codec.sign(codec.marshal_response(response).unwrap()).unwrap();
    InboundMessage::new(HttpMethod::Post, payload)
}

/// Decodes an error response produced by an engine.
pub fn decode_response(payload: &[u8]) -> AuthenticationResponse {
    TestCodec::new("reader").unmarshal_response(payload).unwrap()
}

pub fn entity(value: &str) -> EntityId {
    value.parse().unwrap()
}
