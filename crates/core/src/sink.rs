//! Delivery of outbound events to the call server.

use std::error::Error;
use std::fmt::{self, Display};

use callrelay_model::ClientEvent;
use tokio::sync::mpsc;

/// An outbound event could not be delivered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SinkError {
    message: String,
}

impl SinkError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates an error for a connection that is no longer open.
    #[inline]
    pub fn closed() -> Self {
        Self::new("connection is closed")
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SinkError {}

/// The outbound half of a call-server connection.
///
/// Implementations should only enqueue the event. The relay calls this
/// from its own task and must not be blocked by the transport.
pub trait EventSink: Send + Sync + 'static {
    /// Sends one event.
    fn send(&self, event: &ClientEvent) -> Result<(), SinkError>;
}

impl EventSink for mpsc::UnboundedSender<ClientEvent> {
    #[inline]
    fn send(&self, event: &ClientEvent) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, event.clone())
            .map_err(|_| SinkError::closed())
    }
}

/// A sink for relays that are only observed, every event is refused.
#[derive(Clone, Copy, Debug, Default)]
pub struct Disconnected;

impl EventSink for Disconnected {
    #[inline]
    fn send(&self, _event: &ClientEvent) -> Result<(), SinkError> {
        Err(SinkError::closed())
    }
}
