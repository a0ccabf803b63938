use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use super::state::{RelayState, UpdateFn, run_relay};
use super::{CallStatus, Relay, RelaySnapshot};
use crate::function_call::PendingResponses;
use crate::sink::EventSink;
use crate::transcript::{Clock, Transcript, local_time};

/// [`Relay`] builder.
pub struct RelayBuilder {
    sink: Box<dyn EventSink>,
    on_update: Option<UpdateFn>,
    clock: Clock,
}

impl RelayBuilder {
    /// Creates a new builder sending outbound events to `sink`.
    #[inline]
    pub fn with_sink<S: EventSink>(sink: S) -> Self {
        Self {
            sink: Box::new(sink),
            on_update: None,
            clock: local_time,
        }
    }

    /// Attaches a callback to be invoked with every changed state.
    ///
    /// The callback runs on the relay task and should return quickly.
    #[inline]
    pub fn on_update(
        mut self,
        on_update: impl Fn(&RelaySnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(on_update));
        self
    }

    /// Replaces the clock used to stamp new transcript items.
    #[inline]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the relay task on the current tokio runtime.
    pub fn build(self) -> Relay {
        let RelayBuilder {
            sink,
            on_update,
            clock,
        } = self;

        let state = RelayState {
            transcript: Transcript::with_clock(clock),
            pending: PendingResponses::default(),
            status: CallStatus::Connected,
            sink,
            on_update,
        };
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        tokio::spawn(
            run_relay(state, cmd_rx, close_rx).instrument(trace_span!("relay")),
        );
        Relay {
            cmd_tx,
            close_tx: Arc::new(close_tx),
        }
    }
}
