use std::fmt;
use std::fmt::Formatter;

/// Internal error for the historian query path. It never escapes the
/// manager: the public contract folds it into a result-shaped error field.
#[derive(Debug)]
pub struct PiError(pub String);

impl fmt::Display for PiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PiError: {}", self.0)
    }
}

impl From<&str> for PiError {
    fn from(e: &str) -> Self {
        PiError(e.to_string())
    }
}
impl From<sqlx::Error> for PiError {
    fn from(e: sqlx::Error) -> Self {
        PiError(e.to_string())
    }
}
impl From<tokio::time::error::Elapsed> for PiError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PiError("historian query timed out".to_string())
    }
}
