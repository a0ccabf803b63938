//! Core logic including the transcript reducer, the call relay, tool
//! response correlation, and text messaging.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod function_call;
pub mod messaging;
mod relay;
pub mod sink;
pub mod transcript;

pub use function_call::{
    FunctionCallView, PendingResponses, SubmitError, SubmitErrorKind,
    function_calls,
};
pub use relay::{CallStatus, Relay, RelayBuilder, RelayClosedError, RelaySnapshot};
pub use sink::{EventSink, SinkError};
pub use transcript::{Transcript, reduce};
