use std::fmt;
use std::fmt::Formatter;

/// Error that takes the process down: bad configuration or a failed bind.
/// Everything past bootstrap degrades per-request instead.
#[derive(Debug)]
pub struct UnrecoverableError(pub String);

impl fmt::Display for UnrecoverableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "UnrecoverableError: {}", self.0)
    }
}

impl From<String> for UnrecoverableError {
    fn from(e: String) -> Self {
        UnrecoverableError(e)
    }
}
impl From<&str> for UnrecoverableError {
    fn from(e: &str) -> Self {
        UnrecoverableError(e.to_string())
    }
}
impl From<std::io::Error> for UnrecoverableError {
    fn from(e: std::io::Error) -> Self {
        UnrecoverableError(e.to_string())
    }
}
impl From<serde_json::Error> for UnrecoverableError {
    fn from(e: serde_json::Error) -> Self {
        UnrecoverableError(e.to_string())
    }
}
