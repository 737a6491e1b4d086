//! crossnode protocol engine
//!
//! Validation and negotiation core of a cross-border authentication node.
//! The engine validates inbound and outbound authentication requests and
//! responses, negotiates the level of assurance and compatibility mode
//! between peers running different protocol versions, guards against message
//! replay, correlates request/response pairs across redirects and resolves
//! verified trust metadata of remote parties.
//!
//! Transport, XML handling and cryptographic primitives stay outside: they
//! are reached through [`codec::MessageCodec`], [`metadata::MetadataFetcher`]
//! and [`metadata::MetadataVerifier`].
//!
//! # Modules
//!
//! - [`pipeline`] - Request and response validation state machines
//! - [`negotiation`] - Level-of-assurance negotiation
//! - [`attributes`] - Attribute policy validation
//! - [`metadata`] - Trust metadata resolution and caching
//! - [`anti_replay`] - One-time message acceptance
//! - [`correlation`] - Request/response correlation
//! - [`cache`] - Cache backend abstraction
//! - [`processor`] - Per-generation protocol behaviour
//! - [`config`] - Normalized engine configuration

pub mod anti_replay;
pub mod attributes;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod error;
pub mod metadata;
pub mod models;
pub mod negotiation;
pub mod pipeline;
pub mod processor;

pub use anti_replay::{AntiReplayGuard, ReplayKey};
pub use attributes::{AttributeRegistry, PersonType, UnsupportedAttributePolicy};
pub use cache::{CacheBackend, CacheError, InMemoryCacheBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CodecError, HttpMethod, MessageCodec};
pub use config::{ConfigError, EngineConfig, NodeRole};
pub use correlation::{CorrelationEntry, CorrelationError, CorrelationStore};
pub use error::{ProtocolError, ProtocolResult};
pub use metadata::{MetadataTrustResolver, VerifiedDescriptor};
pub use negotiation::{CompatibilityMode, NegotiationOutcome};
pub use pipeline::{Rejection, Stage, ValidationEngine};
pub use processor::{processor_for, ProtocolProcessor};
