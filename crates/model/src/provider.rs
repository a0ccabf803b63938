use std::error::Error;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// The error type for a completion provider.
pub trait ProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// Who authored a turn of a text conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person texting in.
    User,
    /// The AI reply.
    Assistant,
}

/// A prior turn of a text conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatTurn {
    /// The author of the turn.
    pub speaker: Speaker,
    /// The turn text.
    pub content: String,
}

/// The input that a completion should answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UserInput {
    /// The message text.
    pub text: String,
    /// An optional image attached to the message.
    pub image_url: Option<String>,
}

/// A request for a single text reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompletionRequest {
    /// The system instructions.
    pub system: String,
    /// Prior turns in chronological order.
    pub history: Vec<ChatTurn>,
    /// The input to answer.
    pub input: UserInput,
}

/// A type that represents an AI completion provider.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait CompletionProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ProviderError;

    /// Requests a reply to the given input.
    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;
}
