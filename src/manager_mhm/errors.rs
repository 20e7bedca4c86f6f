use std::fmt;
use std::fmt::Formatter;

/// Fetch failures against the MHM device service. Window validation
/// happens at TimeWindow construction, so only a valid window ever
/// reaches this manager.
#[derive(Debug)]
pub enum MhmError {
    /// Transport failure, non-2xx status, or retries exhausted.
    Upstream(String),
    /// The provider answered with a body we could not decode.
    Document(String),
}

impl fmt::Display for MhmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MhmError::Upstream(e) => write!(f, "MhmError::Upstream: {}", e),
            MhmError::Document(e) => write!(f, "MhmError::Document: {}", e),
        }
    }
}

impl From<reqwest::Error> for MhmError {
    fn from(e: reqwest::Error) -> Self {
        MhmError::Upstream(e.to_string())
    }
}
impl From<serde_json::Error> for MhmError {
    fn from(e: serde_json::Error) -> Self {
        MhmError::Document(e.to_string())
    }
}
