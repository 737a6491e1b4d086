//! Trust metadata of remote parties.

pub mod fetcher;
pub mod resolver;
pub mod verifier;

pub use fetcher::{FetchError, HttpMetadataFetcher, MetadataFetcher, RawMetadata, StaticMetadataFetcher};
pub use resolver::{MetadataTrustResolver, VerifiedDescriptor, DEFAULT_METADATA_TTL};
pub use verifier::{MetadataVerifier, MetadataVerifyError, PinnedDigestVerifier};
