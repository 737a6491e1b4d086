//! Message, metadata and assurance-level models.

pub mod binding;
pub mod descriptor;
pub mod loa;
pub mod request;
pub mod response;
pub mod version;

pub use binding::{Binding, HttpMethod};
pub use descriptor::{CertificateRef, Endpoint, Role, RoleDescriptor, TrustDescriptor};
pub use loa::{parse_loa_list, LevelOfAssurance, LoaComparison, NotifiedLevel, ParseLoaError};
pub use request::{AuthenticationRequest, AuthenticationRequestBuilder, RequestedAttribute, SectorType};
pub use response::{AttributeValue, AuthenticationResponse, AuthenticationResponseBuilder, ResponseStatus};
pub use version::{ProtocolGeneration, ProtocolVersion};
