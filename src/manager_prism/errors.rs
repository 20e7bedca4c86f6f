use std::fmt;
use std::fmt::Formatter;

#[derive(Debug)]
pub enum PrismError {
    /// Transport failure or non-2xx status. This fetcher does not retry.
    Upstream(String),
    /// The provider answered with a body we could not decode.
    Document(String),
}

impl fmt::Display for PrismError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PrismError::Upstream(e) => write!(f, "PrismError::Upstream: {}", e),
            PrismError::Document(e) => write!(f, "PrismError::Document: {}", e),
        }
    }
}

impl From<reqwest::Error> for PrismError {
    fn from(e: reqwest::Error) -> Self {
        PrismError::Upstream(e.to_string())
    }
}
impl From<serde_json::Error> for PrismError {
    fn from(e: serde_json::Error) -> Self {
        PrismError::Document(e.to_string())
    }
}
