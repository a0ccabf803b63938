use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The kind of error a completion provider may report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// Any other errors.
    Other,
}

/// An inbound event could not be decoded.
///
/// This covers payloads that are not JSON, that lack the `type`
/// discriminator, or whose fields have an unexpected shape.
#[derive(Debug)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Returns a human-readable description of the failure.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            message: format!("{err}"),
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "malformed event: {}", self.message)
    }
}

impl Error for DecodeError {}
