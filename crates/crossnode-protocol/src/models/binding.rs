//! Transport bindings declared by messages and metadata.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Transport binding of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    #[serde(rename = "HTTP-POST")]
    HttpPost,
    #[serde(rename = "HTTP-Redirect")]
    HttpRedirect,
}

/// HTTP method a message arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl Binding {
    /// The method a message sent with this binding arrives with.
    #[must_use]
    pub fn expected_method(&self) -> HttpMethod {
        match self {
            Self::HttpPost => HttpMethod::Post,
            Self::HttpRedirect => HttpMethod::Get,
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpPost => f.write_str("HTTP-POST"),
            Self::HttpRedirect => f.write_str("HTTP-Redirect"),
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}
