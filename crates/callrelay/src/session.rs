use callrelay_core::transcript::Clock;
use callrelay_core::{Relay, RelayBuilder, RelaySnapshot, SinkError};
use callrelay_model::{ClientEvent, SessionConfig};
use tokio::sync::mpsc;

type UpdateFn = Box<dyn Fn(&RelaySnapshot) + Send + Sync>;

/// A call session builder.
///
/// See [`CallSession`].
#[derive(Default)]
pub struct CallSessionBuilder {
    config: SessionConfig,
    on_update: Option<UpdateFn>,
    clock: Option<Clock>,
}

impl CallSessionBuilder {
    /// Sets the settings announced when the session starts.
    #[inline]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a callback to be invoked when the transcript changes.
    #[inline]
    pub fn on_update(
        mut self,
        on_update: impl Fn(&RelaySnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(on_update));
        self
    }

    /// Replaces the clock used to stamp transcript items.
    #[inline]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds a new session on the current tokio runtime.
    pub fn build(self) -> CallSession {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut relay_builder = RelayBuilder::with_sink(outbound_tx);
        if let Some(on_update) = self.on_update {
            relay_builder = relay_builder.on_update(on_update);
        }
        if let Some(clock) = self.clock {
            relay_builder = relay_builder.with_clock(clock);
        }

        CallSession {
            relay: relay_builder.build(),
            config: self.config,
            outbound_rx,
        }
    }
}

/// One connection to the call server, seen from the client side.
///
/// Inbound events go to the [`Relay`], outbound events are queued and can
/// be taken as JSON lines ready to be written to the connection.
pub struct CallSession {
    relay: Relay,
    config: SessionConfig,
    outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl CallSession {
    /// Returns the relay owning the transcript.
    #[inline]
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Announces the session settings to the call server.
    #[inline]
    pub async fn start(&self) -> Result<(), SinkError> {
        self.relay.update_session(self.config.clone()).await
    }

    /// Takes all queued outbound events, serialized as JSON.
    pub fn drain_outbound(&mut self) -> Vec<String> {
        let mut lines = vec![];
        while let Ok(event) = self.outbound_rx.try_recv() {
            match serde_json::to_string(&event) {
                Ok(line) => lines.push(line),
                Err(err) => error!("failed to encode {event:?}: {err}"),
            }
        }
        lines
    }

    /// Stops the relay.
    #[inline]
    pub fn close(&self) {
        self.relay.close();
    }
}

#[cfg(test)]
mod tests {
    use callrelay_model::Voice;
    use serde_json::{Value, json};

    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let mut session = CallSessionBuilder::default()
            .with_session_config(SessionConfig {
                instructions: "Be brief.".to_owned(),
                voice: Voice::Nova,
            })
            .build();
        session.start().await.unwrap();

        let relay = session.relay();
        relay
            .push_json(
                &json!({
                    "type": "response.output_item.done",
                    "item": {
                        "id": "fc_1",
                        "type": "function_call",
                        "call_id": "c1",
                        "name": "lookup",
                        "arguments": "{}"
                    }
                })
                .to_string(),
            )
            .unwrap();
        relay.set_draft("c1", "found").unwrap();
        relay.submit_response("c1").await.unwrap();

        let lines: Vec<Value> = session
            .drain_outbound()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({
                    "type": "session.update",
                    "session": { "instructions": "Be brief.", "voice": "nova" }
                }),
                json!({
                    "type": "conversation.item.create",
                    "item": {
                        "type": "function_call_output",
                        "call_id": "c1",
                        "output": "\"found\""
                    }
                }),
                json!({ "type": "response.create" }),
            ]
        );
        assert!(session.drain_outbound().is_empty());
        session.close();
    }
}
