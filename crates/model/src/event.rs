use serde::Deserialize;

use crate::error::DecodeError;
use crate::item::{ContentPart, Role};

/// An item as carried by `conversation.item.created` and
/// `response.output_item.done` events.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeItem {
    /// A user or assistant message.
    Message {
        /// Item identifier.
        #[serde(default)]
        id: Option<String>,
        /// Message speaker.
        #[serde(default)]
        role: Option<Role>,
        /// Message content, may be absent.
        #[serde(default)]
        content: Option<Vec<ContentPart>>,
    },
    /// A function call emitted by the model.
    FunctionCall {
        /// Item identifier.
        #[serde(default)]
        id: Option<String>,
        /// Identifier correlating the call with its output.
        #[serde(default)]
        call_id: String,
        /// The function name.
        #[serde(default)]
        name: String,
        /// Raw serialized JSON arguments.
        #[serde(default)]
        arguments: String,
    },
    /// The output supplied for a function call.
    FunctionCallOutput {
        /// Item identifier.
        #[serde(default)]
        id: Option<String>,
        /// Identifier of the answered call.
        #[serde(default)]
        call_id: String,
        /// Raw serialized JSON output.
        #[serde(default)]
        output: String,
    },
    /// Any other item type.
    #[serde(other)]
    Other,
}

/// A decoded inbound event from the voice-call server.
///
/// Only the events that affect the transcript are modelled. Every other
/// event type decodes to [`ServerEvent::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A new session has begun.
    #[serde(rename = "session.created")]
    SessionCreated {},
    /// The caller started speaking.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Identifier of the user item that will hold the speech.
        item_id: String,
    },
    /// An item was added to the conversation.
    #[serde(rename = "conversation.item.created")]
    ItemCreated {
        /// The created item.
        item: RealtimeItem,
    },
    /// The caller's speech has been transcribed.
    #[serde(
        rename = "conversation.item.input_audio_transcription.completed"
    )]
    TranscriptionCompleted {
        /// Identifier of the transcribed user item.
        item_id: String,
        /// Final transcript text.
        transcript: String,
    },
    /// The model added a content part to an output item.
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        /// Identifier of the output item.
        item_id: String,
        /// Position of the item within the response output.
        output_index: u32,
        /// The added part.
        part: ContentPart,
    },
    /// A chunk of the model's spoken transcript.
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        /// Identifier of the output item.
        item_id: String,
        /// Position of the item within the response output.
        output_index: u32,
        /// The transcript chunk.
        #[serde(default)]
        delta: String,
    },
    /// The model finished an output item.
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// The finished item.
        item: RealtimeItem,
    },
    /// Any event type not listed above.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decodes an event from its JSON text.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(DecodeError::from)
    }

    /// Decodes an event from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value).map_err(DecodeError::from)
    }
}
