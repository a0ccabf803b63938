use serde::{Deserialize, Serialize};

/// Default instructions for a phone-call session.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant on a \
    phone call. Answer the caller's questions clearly and concisely.";

/// The voice the model speaks with.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

/// Session settings that can be changed while a call is connected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System instructions for the model.
    pub instructions: String,
    /// The output voice.
    pub voice: Voice,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_owned(),
            voice: Voice::default(),
        }
    }
}

/// An item the client adds to the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundItem {
    /// The result for a pending function call.
    FunctionCallOutput {
        /// Identifier of the answered call.
        call_id: String,
        /// JSON-serialized output.
        output: String,
    },
}

/// An outbound event sent to the voice-call server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Adds an item to the conversation.
    #[serde(rename = "conversation.item.create")]
    ItemCreate {
        /// The item to add.
        item: OutboundItem,
    },
    /// Asks the model to continue generating.
    #[serde(rename = "response.create")]
    ResponseCreate,
    /// Updates the session settings.
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// The new settings.
        session: SessionConfig,
    },
}

impl ClientEvent {
    /// Creates an event that provides the output of a function call.
    ///
    /// `response` is serialized as a JSON string, so the model always
    /// receives valid JSON regardless of what the user typed.
    pub fn function_call_output(call_id: &str, response: &str) -> Self {
        // Serializing a `&str` cannot fail.
        let output = serde_json::to_string(response).unwrap_or_default();
        ClientEvent::ItemCreate {
            item: OutboundItem::FunctionCallOutput {
                call_id: call_id.to_owned(),
                output,
            },
        }
    }
}
