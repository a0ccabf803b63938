use std::fmt::{self, Debug};

use callrelay_model::{ClientEvent, ServerEvent, SessionConfig};
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};

use super::{CallStatus, RelaySnapshot};
use crate::function_call::{PendingResponses, SubmitError, SubmitErrorKind};
use crate::sink::{EventSink, SinkError};
use crate::transcript::Transcript;

pub type UpdateFn = Box<dyn Fn(&RelaySnapshot) + Send + Sync>;

pub enum Command {
    Event(ServerEvent),
    SetDraft {
        call_id: String,
        text: String,
    },
    Submit {
        call_id: String,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    UpdateSession {
        config: SessionConfig,
        reply: oneshot::Sender<Result<(), SinkError>>,
    },
    Snapshot(oneshot::Sender<RelaySnapshot>),
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Command::SetDraft { call_id, .. } => f
                .debug_struct("SetDraft")
                .field("call_id", call_id)
                .finish_non_exhaustive(),
            Command::Submit { call_id, .. } => f
                .debug_struct("Submit")
                .field("call_id", call_id)
                .finish_non_exhaustive(),
            Command::UpdateSession { config, .. } => f
                .debug_struct("UpdateSession")
                .field("config", config)
                .finish_non_exhaustive(),
            Command::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

pub struct RelayState {
    pub(super) transcript: Transcript,
    pub(super) pending: PendingResponses,
    pub(super) status: CallStatus,
    pub(super) sink: Box<dyn EventSink>,
    pub(super) on_update: Option<UpdateFn>,
}

impl RelayState {
    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Event(event) => {
                let mut changed = self.transcript.apply(&event);
                if matches!(event, ServerEvent::SpeechStarted { .. })
                    && self.status != CallStatus::Active
                {
                    self.status = CallStatus::Active;
                    changed = true;
                }
                if changed {
                    self.pending.retain_pending(self.transcript.items());
                    self.notify();
                }
            }
            Command::SetDraft { call_id, text } => {
                self.pending.set_draft(call_id, text);
            }
            Command::Submit { call_id, reply } => {
                let result = self.submit(&call_id);
                if let Err(err) = &result {
                    warn!("tool response not submitted: {err}");
                }
                reply.send(result).ok();
            }
            Command::UpdateSession { config, reply } => {
                let result =
                    self.sink.send(&ClientEvent::SessionUpdate { session: config });
                if let Err(err) = &result {
                    error!("failed to send session update: {err}");
                }
                reply.send(result).ok();
            }
            Command::Snapshot(reply) => {
                reply.send(self.snapshot()).ok();
            }
        }
    }

    fn submit(&mut self, call_id: &str) -> Result<(), SubmitError> {
        let events = self.pending.prepare(self.transcript.items(), call_id)?;
        for event in &events {
            if let Err(err) = self.sink.send(event) {
                error!("failed to send tool response: {err}");
                return Err(SubmitError::new(
                    SubmitErrorKind::Disconnected,
                    call_id,
                ));
            }
        }
        self.pending.finish(call_id);
        Ok(())
    }

    #[inline]
    fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            items: self.transcript.snapshot(),
            status: self.status,
        }
    }

    fn notify(&self) {
        if let Some(on_update) = &self.on_update {
            on_update(&self.snapshot());
        }
    }
}

pub async fn run_relay(
    mut state: RelayState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut close_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let cmd = select! {
            biased;

            _ = close_rx.changed() => {
                break;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                cmd
            }
        };
        trace!("received command: {cmd:?}");

        let proc_span = trace_span!("proc cmd");
        proc_span.in_scope(|| {
            state.handle(cmd);
            trace!("finished");
        });
    }

    state.status = CallStatus::Disconnected;
    state.notify();
    debug!("will terminate");
}
