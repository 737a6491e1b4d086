//! Verification of raw metadata documents.
//!
//! A verifier turns a raw document into a [`TrustDescriptor`] only after
//! establishing that the document is authentic. XML signature handling is
//! the codec's business and lives behind this trait; the engine ships a
//! digest-pinning verifier for JSON descriptors.

use super::fetcher::RawMetadata;
use crate::models::TrustDescriptor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Metadata verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataVerifyError {
    /// Document is authentic but cannot be understood
    #[error("Metadata parse error: {0}")]
    Parse(String),

    /// Document authenticity could not be established
    #[error("Metadata signature error: {0}")]
    Signature(String),

    /// Document describes a different entity than the one requested
    #[error("Metadata describes {actual}, expected {expected}")]
    EntityMismatch { expected: String, actual: String },
}

/// Parses and authenticates raw metadata.
pub trait MetadataVerifier: Send + Sync {
    fn verify(&self, raw: &RawMetadata) -> Result<TrustDescriptor, MetadataVerifyError>;
}

/// Accepts a JSON descriptor only when its SHA-256 digest matches the digest
/// pinned for the URL it was fetched from.
#[derive(Debug, Clone, Default)]
pub struct PinnedDigestVerifier {
    pins: HashMap<String, String>,
}

impl PinnedDigestVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the hex-encoded SHA-256 digest of the document at `url`.
    #[must_use]
    pub fn pin(mut self, url: impl Into<String>, sha256_hex: impl Into<String>) -> Self {
        self.pins
            .insert(url.into(), sha256_hex.into().to_ascii_lowercase());
        self
    }

    /// Hex-encoded SHA-256 digest of a document body.
    #[must_use]
    pub fn digest(body: &[u8]) -> String {
        hex::encode(Sha256::digest(body))
    }
}

impl MetadataVerifier for PinnedDigestVerifier {
    fn verify(&self, raw: &RawMetadata) -> Result<TrustDescriptor, MetadataVerifyError> {
        let pinned = self
            .pins
            .get(&raw.url)
            .ok_or_else(|| MetadataVerifyError::Signature(format!("no pin for {}", raw.url)))?;

        let actual = Self::digest(&raw.body);
        if &actual != pinned {
            return Err(MetadataVerifyError::Signature(format!(
                "digest mismatch for {}",
                raw.url
            )));
        }

        let descriptor: TrustDescriptor = serde_json::from_slice(&raw.body)
            .map_err(|e| MetadataVerifyError::Parse(e.to_string()))?;

        if descriptor.entity_id.as_str() != raw.url {
            return Err(MetadataVerifyError::EntityMismatch {
                expected: raw.url.clone(),
                actual: descriptor.entity_id.to_string(),
            });
        }

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://ps.example/metadata";

    fn raw(body: &str) -> RawMetadata {
        RawMetadata {
            url: URL.to_string(),
            body: body.as_bytes().to_vec(),
            content_type: None,
        }
    }

    fn document() -> String {
        format!(r#"{{"entity_id":"{URL}","protocol_versions":["1.2"]}}"#)
    }

    #[test]
    fn test_pinned_document_is_accepted() {
        let body = document();
        let verifier =
            PinnedDigestVerifier::new().pin(URL, PinnedDigestVerifier::digest(body.as_bytes()));
        let descriptor = verifier.verify(&raw(&body)).unwrap();
        assert_eq!(descriptor.entity_id.as_str(), URL);
        assert_eq!(descriptor.protocol_versions, vec!["1.2".to_string()]);
    }

    #[test]
    fn test_tampered_document_is_refused() {
        let body = document();
        let verifier =
            PinnedDigestVerifier::new().pin(URL, PinnedDigestVerifier::digest(body.as_bytes()));
        let tampered = body.replace("1.2", "1.1");
        assert!(matches!(
            verifier.verify(&raw(&tampered)),
            Err(MetadataVerifyError::Signature(_))
        ));
    }

    #[test]
    fn test_unpinned_url_is_refused() {
        let verifier = PinnedDigestVerifier::new();
        assert!(matches!(
            verifier.verify(&raw(&document())),
            Err(MetadataVerifyError::Signature(_))
        ));
    }

    #[test]
    fn test_entity_mismatch() {
        let body = r#"{"entity_id":"https://other.example/metadata"}"#;
        let verifier =
            PinnedDigestVerifier::new().pin(URL, PinnedDigestVerifier::digest(body.as_bytes()));
        assert!(matches!(
            verifier.verify(&raw(body)),
            Err(MetadataVerifyError::EntityMismatch { .. })
        ));
    }

    #[test]
    fn test_pin_is_case_insensitive() {
        let body = document();
        let digest = PinnedDigestVerifier::digest(body.as_bytes()).to_ascii_uppercase();
        let verifier = PinnedDigestVerifier::new().pin(URL, digest);
        assert!(verifier.verify(&raw(&body)).is_ok());
    }
}
