//! Message codec boundary.
//!
//! Everything that touches the wire format or key material is done by the
//! codec: decoding and encoding messages, signing, verifying signatures
//! against certificates taken from verified metadata, encrypting for a
//! recipient, and deciding whether an HTTP method fits a declared binding.

use crate::models::{AuthenticationRequest, AuthenticationResponse, Binding, CertificateRef};
use thiserror::Error;

pub use crate::models::HttpMethod;

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Cannot decode message: {0}")]
    Decode(String),

    #[error("Cannot encode message: {0}")]
    Encode(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

/// Wire format and cryptography of protocol messages.
pub trait MessageCodec: Send + Sync {
    fn unmarshal_request(&self, payload: &[u8]) -> Result<AuthenticationRequest, CodecError>;

    fn marshal_request(&self, request: &AuthenticationRequest) -> Result<Vec<u8>, CodecError>;

    fn unmarshal_response(&self, payload: &[u8]) -> Result<AuthenticationResponse, CodecError>;

    fn marshal_response(&self, response: &AuthenticationResponse) -> Result<Vec<u8>, CodecError>;

    /// Signs an encoded message with the node's signing key.
    fn sign(&self, payload: Vec<u8>) -> Result<Vec<u8>, CodecError>;

    /// Verifies the signature of an encoded message against any of the
    /// given certificates.
    fn verify(&self, payload: &[u8], certificates: &[CertificateRef]) -> Result<(), CodecError>;

    /// Encrypts an encoded message for a recipient.
    fn encrypt(
        &self,
        payload: Vec<u8>,
        certificates: &[CertificateRef],
    ) -> Result<Vec<u8>, CodecError>;

    /// Whether a message arriving with `method` may claim `declared`.
    fn is_binding_acceptable(&self, method: HttpMethod, declared: Option<Binding>) -> bool;
}
