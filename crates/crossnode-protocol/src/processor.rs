//! Per-generation protocol behaviour.
//!
//! The behaviour that differs between protocol generations is kept behind
//! [`ProtocolProcessor`]. Processors are stateless and looked up once per
//! message from a fixed table keyed by generation.

use crate::error::{ProtocolError, ProtocolResult};
use crate::models::request::NAME_ID_FORMAT_UNSPECIFIED;
use crate::models::{AuthenticationRequest, LevelOfAssurance, ProtocolGeneration, SectorType};
use crate::negotiation::CompatibilityMode;
use tracing::debug;

/// Behaviour specific to a protocol generation.
pub trait ProtocolProcessor: Send + Sync {
    fn generation(&self) -> ProtocolGeneration;

    /// How published levels are read by peers of this generation.
    fn compatibility_mode(&self) -> CompatibilityMode;

    /// Whether a request from a peer of this generation must carry a
    /// requester id, given its sector and the requester-id flag.
    fn requires_requester_id(&self, sector: Option<SectorType>, flag: bool) -> bool;

    /// Adapts an outbound request to what peers of this generation accept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLoa` when nothing acceptable to the peer remains.
    fn normalize_outbound(&self, request: AuthenticationRequest)
        -> ProtocolResult<AuthenticationRequest>;
}

/// Processor for peers that only speak protocol 1.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyProcessor;

impl ProtocolProcessor for LegacyProcessor {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Legacy
    }

    fn compatibility_mode(&self) -> CompatibilityMode {
        CompatibilityMode::Legacy
    }

    // Legacy peers cannot carry a requester id.
    fn requires_requester_id(&self, _sector: Option<SectorType>, _flag: bool) -> bool {
        false
    }

    fn normalize_outbound(
        &self,
        request: AuthenticationRequest,
    ) -> ProtocolResult<AuthenticationRequest> {
        let notified: Vec<LevelOfAssurance> = request
            .levels_of_assurance()
            .iter()
            .filter(|l| l.is_notified())
            .cloned()
            .collect();
        if notified.is_empty() {
            return Err(ProtocolError::InvalidLoa(
                "legacy destination requires a notified level of assurance".to_string(),
            ));
        }

        let name_id_format = request
            .name_id_format()
            .map_or_else(|| NAME_ID_FORMAT_UNSPECIFIED.to_string(), String::from);

        if request.requester_id().is_some() {
            debug!(request_id = %request.id(), "Dropping requester id for legacy destination");
        }

        Ok(request
            .to_builder()
            .levels_of_assurance(notified)
            .name_id_format(Some(name_id_format))
            .requester_id(None)
            .build())
    }
}

/// Processor for peers that speak protocol 1.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentProcessor;

impl ProtocolProcessor for CurrentProcessor {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Current
    }

    fn compatibility_mode(&self) -> CompatibilityMode {
        CompatibilityMode::Current
    }

    fn requires_requester_id(&self, sector: Option<SectorType>, flag: bool) -> bool {
        flag && sector == Some(SectorType::Private)
    }

    fn normalize_outbound(
        &self,
        request: AuthenticationRequest,
    ) -> ProtocolResult<AuthenticationRequest> {
        Ok(request)
    }
}

static LEGACY: LegacyProcessor = LegacyProcessor;
static CURRENT: CurrentProcessor = CurrentProcessor;

/// The processor for a generation.
#[must_use]
pub fn processor_for(generation: ProtocolGeneration) -> &'static dyn ProtocolProcessor {
    match generation {
        ProtocolGeneration::Legacy => &LEGACY,
        ProtocolGeneration::Current => &CURRENT,
    }
}
