use std::error::Error;
use std::fmt::{self, Display};

/// The kind of error that occurred while submitting a tool response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmitErrorKind {
    /// No function call with the given id is in the transcript.
    UnknownCall,
    /// The call already has an output.
    AlreadyCompleted,
    /// No response text was entered for the call.
    EmptyResponse,
    /// The events could not be delivered to the call server.
    Disconnected,
}

impl Display for SubmitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitErrorKind::UnknownCall => write!(f, "Unknown call"),
            SubmitErrorKind::AlreadyCompleted => write!(f, "Already completed"),
            SubmitErrorKind::EmptyResponse => write!(f, "Empty response"),
            SubmitErrorKind::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Describes why a tool response could not be submitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubmitError {
    kind: SubmitErrorKind,
    call_id: String,
}

impl SubmitError {
    #[inline]
    pub(crate) fn new<S: Into<String>>(
        kind: SubmitErrorKind,
        call_id: S,
    ) -> Self {
        Self {
            kind,
            call_id: call_id.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> SubmitErrorKind {
        self.kind
    }

    /// Returns the id of the call the submission was for.
    #[inline]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.call_id)
    }
}

impl Error for SubmitError {}
