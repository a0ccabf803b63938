mod builder;
mod state;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use callrelay_model::{ConversationItem, ServerEvent, SessionConfig};
use tokio::sync::{mpsc, oneshot, watch};

pub use builder::RelayBuilder;
use state::Command;

use crate::function_call::{
    FunctionCallView, SubmitError, SubmitErrorKind, function_calls,
};
use crate::sink::SinkError;

/// A type of error which can be returned whenever commands are sent to
/// a relay that has terminated.
pub struct RelayClosedError;

impl fmt::Debug for RelayClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClosedError").finish()
    }
}

impl fmt::Display for RelayClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the relay has terminated".fmt(f)
    }
}

impl Error for RelayClosedError {}

/// The connection state of a call as seen by the relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallStatus {
    /// The relay has terminated.
    Disconnected,
    /// Connected to the call server, no speech yet.
    #[default]
    Connected,
    /// The caller has spoken at least once.
    Active,
}

/// An immutable view of the relay state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelaySnapshot {
    /// Transcript items in arrival order.
    pub items: Arc<[ConversationItem]>,
    /// The call status.
    pub status: CallStatus,
}

impl RelaySnapshot {
    /// Lists the function calls of this snapshot.
    #[inline]
    pub fn function_calls(&self) -> Vec<FunctionCallView> {
        function_calls(&self.items)
    }
}

/// A handle to a running transcript relay.
///
/// The relay owns the transcript of one call-server connection and is its
/// only writer. Inbound events are applied strictly in the order they are
/// pushed, and every change is published as a [`RelaySnapshot`] through
/// the `on_update` callback of [`RelayBuilder`].
///
/// Handles are cheap to clone. The relay stops when [`Relay::close`] is
/// called or all handles are dropped.
#[derive(Clone)]
pub struct Relay {
    cmd_tx: mpsc::UnboundedSender<Command>,
    close_tx: Arc<watch::Sender<bool>>,
}

impl Relay {
    /// Feeds a decoded event.
    #[inline]
    pub fn push_event(&self, event: ServerEvent) -> Result<(), RelayClosedError> {
        self.send(Command::Event(event))
    }

    /// Decodes and feeds a raw JSON event.
    ///
    /// Malformed payloads are logged and dropped, only a terminated relay
    /// is reported as an error.
    pub fn push_json(&self, text: &str) -> Result<(), RelayClosedError> {
        match ServerEvent::decode(text) {
            Ok(event) => self.push_event(event),
            Err(err) => {
                warn!("{err}");
                if self.cmd_tx.is_closed() {
                    return Err(RelayClosedError);
                }
                Ok(())
            }
        }
    }

    /// Records the response text entered for a pending function call.
    #[inline]
    pub fn set_draft<S1, S2>(
        &self,
        call_id: S1,
        text: S2,
    ) -> Result<(), RelayClosedError>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.send(Command::SetDraft {
            call_id: call_id.into(),
            text: text.into(),
        })
    }

    /// Submits the drafted response of a pending function call.
    ///
    /// On success the output event and a continue event have been handed
    /// to the sink. The call is marked completed once the server echoes the
    /// output back.
    pub async fn submit_response(&self, call_id: &str) -> Result<(), SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let disconnected =
            || SubmitError::new(SubmitErrorKind::Disconnected, call_id);
        self.send(Command::Submit {
            call_id: call_id.to_owned(),
            reply: reply_tx,
        })
        .map_err(|_| disconnected())?;
        reply_rx.await.map_err(|_| disconnected())?
    }

    /// Sends new session settings to the call server.
    pub async fn update_session(
        &self,
        config: SessionConfig,
    ) -> Result<(), SinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::UpdateSession {
            config,
            reply: reply_tx,
        })
        .map_err(|_| SinkError::closed())?;
        reply_rx.await.map_err(|_| SinkError::closed())?
    }

    /// Returns the current state once all previously pushed events have
    /// been applied.
    pub async fn snapshot(&self) -> Result<RelaySnapshot, RelayClosedError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| RelayClosedError)
    }

    /// Stops the relay.
    ///
    /// Commands already queued may be discarded.
    #[inline]
    pub fn close(&self) {
        self.close_tx.send(true).ok();
    }

    #[inline]
    fn send(&self, cmd: Command) -> Result<(), RelayClosedError> {
        self.cmd_tx.send(cmd).map_err(|_| RelayClosedError)
    }
}
