//! Text conversations relayed between a messaging provider and a
//! completion provider.

mod store;
#[cfg(test)]
mod tests;

use std::error::Error;
use std::fmt::{self, Display};

use async_trait::async_trait;
use callrelay_model::{
    ChatTurn, CompletionProvider, CompletionRequest, ProviderError, Speaker,
    UserInput,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::Instrument;

pub use store::*;

/// Author name the messaging provider attaches to our own replies.
pub const ASSISTANT_AUTHOR: &str = "AI Assistant";

/// The default system prompt for text conversations.
pub const SYSTEM_PROMPT: &str = "You are a helpful, friendly AI assistant \
communicating through iMessage. Be concise but helpful.";

/// The reply sent when no completion could be obtained.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I encountered an error. Please try again later.";

/// The first message sent to a newly registered number.
pub const WELCOME_MESSAGE: &str = "Hi there! I'm your AI assistant. You can \
ask me anything. How can I help you today?";

/// Number of stored messages passed to the model as prior turns.
pub const HISTORY_LIMIT: usize = 10;

/// A message delivered by the messaging provider's webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// Display name of the sender.
    #[serde(rename = "Author", default)]
    pub author: String,
    /// Message text.
    #[serde(rename = "Body", default)]
    pub body: String,
    /// The conversation the message belongs to.
    #[serde(rename = "ConversationSid", default)]
    pub conversation_sid: String,
    /// Provider id of the message.
    #[serde(rename = "MessageSid", default)]
    pub message_sid: String,
    /// An image attached to the message.
    #[serde(rename = "MediaUrl", default)]
    pub image_url: Option<String>,
}

/// What happened to an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The message was our own reply echoed back.
    Ignored,
    /// A reply was stored and sent.
    Replied(String),
}

/// The kind of a [`WebhookError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookErrorKind {
    /// Required fields are missing.
    InvalidRequest,
    /// No registered user matches the request.
    UserNotFound,
    /// The phone number is registered already.
    AlreadyRegistered,
    /// The message store failed.
    Store,
    /// The messaging provider failed.
    Outbound,
}

/// An inbound message or registration could not be processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookError {
    kind: WebhookErrorKind,
    message: String,
}

impl WebhookError {
    fn new<S: Into<String>>(kind: WebhookErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> WebhookErrorKind {
        self.kind
    }
}

impl Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for WebhookError {}

impl From<StoreError> for WebhookError {
    fn from(err: StoreError) -> Self {
        Self::new(WebhookErrorKind::Store, format!("store error: {err}"))
    }
}

impl From<OutboundError> for WebhookError {
    fn from(err: OutboundError) -> Self {
        Self::new(
            WebhookErrorKind::Outbound,
            format!("messaging provider error: {err}"),
        )
    }
}

/// The messaging provider rejected a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundError {
    message: String,
}

impl OutboundError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for OutboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for OutboundError {}

/// The sending side of a messaging provider.
#[async_trait]
pub trait OutboundMessenger: Send + Sync {
    /// Creates a conversation and returns its id.
    async fn create_conversation(
        &self,
        friendly_name: &str,
    ) -> Result<String, OutboundError>;

    /// Adds a phone number to a conversation.
    async fn add_participant(
        &self,
        conversation_sid: &str,
        phone_number: &str,
    ) -> Result<(), OutboundError>;

    /// Sends a message to a phone number within a conversation.
    async fn send_message(
        &self,
        phone_number: &str,
        body: &str,
        conversation_sid: &str,
    ) -> Result<(), OutboundError>;
}

/// Normalizes a phone number to E.164 form.
///
/// Numbers with a leading `+` are kept as-is. Others are read as North
/// American numbers and prefixed with `+1`.
pub fn normalize_phone(phone_number: &str) -> Option<String> {
    let phone_number = phone_number.trim();
    if phone_number.starts_with('+') {
        return (phone_number.len() > 1).then(|| phone_number.to_owned());
    }
    let digits: String =
        phone_number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("+1{digits}"))
}

/// Answers text messages of registered users with model completions.
pub struct MessagingService<P, S, O> {
    provider: P,
    store: S,
    outbound: O,
    system_prompt: String,
}

impl<P, S, O> MessagingService<P, S, O>
where
    P: CompletionProvider,
    S: MessageStore,
    O: OutboundMessenger,
{
    /// Creates a service with the default system prompt.
    pub fn new(provider: P, store: S, outbound: O) -> Self {
        Self {
            provider,
            store,
            outbound,
            system_prompt: SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Replaces the system prompt.
    #[inline]
    pub fn with_system_prompt<T: Into<String>>(mut self, prompt: T) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Returns the message store.
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a phone number and greets it.
    pub async fn register(
        &self,
        phone_number: &str,
    ) -> Result<User, WebhookError> {
        let Some(phone_number) = normalize_phone(phone_number) else {
            return Err(WebhookError::new(
                WebhookErrorKind::InvalidRequest,
                "phone number is required",
            ));
        };
        if self.store.find_by_phone(&phone_number).await?.is_some() {
            return Err(WebhookError::new(
                WebhookErrorKind::AlreadyRegistered,
                format!("{phone_number} is already registered"),
            ));
        }

        let conversation_sid = self
            .outbound
            .create_conversation(&format!("Conversation for {phone_number}"))
            .await?;
        let user = self
            .store
            .insert_user(&phone_number, &conversation_sid, Utc::now())
            .await?;
        self.outbound
            .add_participant(&conversation_sid, &phone_number)
            .await?;
        self.outbound
            .send_message(&phone_number, WELCOME_MESSAGE, &conversation_sid)
            .await?;
        info!("registered {phone_number} in {conversation_sid}");
        Ok(user)
    }

    /// Handles a message delivered by the webhook.
    pub async fn handle(
        &self,
        inbound: InboundMessage,
    ) -> Result<WebhookOutcome, WebhookError> {
        if inbound.conversation_sid.is_empty() || inbound.body.is_empty() {
            return Err(WebhookError::new(
                WebhookErrorKind::InvalidRequest,
                "conversation id and body are required",
            ));
        }
        if inbound.author == ASSISTANT_AUTHOR {
            trace!("ignoring own message {}", inbound.message_sid);
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(user) = self
            .store
            .find_by_conversation(&inbound.conversation_sid)
            .await?
        else {
            return Err(WebhookError::new(
                WebhookErrorKind::UserNotFound,
                format!("no user for conversation {}", inbound.conversation_sid),
            ));
        };
        debug!(
            "message {} from {}",
            inbound.message_sid, user.phone_number
        );

        let history = self.store.recent(user.id, HISTORY_LIMIT).await?;
        let now = Utc::now();
        self.store
            .append(
                user.id,
                StoredMessage {
                    content: inbound.body.clone(),
                    from: Speaker::User,
                    image_url: inbound.image_url.clone(),
                    timestamp: now,
                },
            )
            .await?;
        self.store.touch(user.id, now).await?;

        let req = CompletionRequest {
            system: self.system_prompt.clone(),
            history: history
                .into_iter()
                .map(|message| ChatTurn {
                    speaker: message.from,
                    content: message.content,
                })
                .collect(),
            input: UserInput {
                text: inbound.body,
                image_url: inbound.image_url,
            },
        };
        let reply = self.complete(&req).await;

        self.store
            .append(
                user.id,
                StoredMessage {
                    content: reply.clone(),
                    from: Speaker::Assistant,
                    image_url: None,
                    timestamp: Utc::now(),
                },
            )
            .await?;
        self.outbound
            .send_message(&user.phone_number, &reply, &user.conversation_sid)
            .await?;
        Ok(WebhookOutcome::Replied(reply))
    }

    /// Returns the whole history of a registered number.
    pub async fn history(
        &self,
        phone_number: &str,
    ) -> Result<Vec<StoredMessage>, WebhookError> {
        let user = match normalize_phone(phone_number) {
            Some(phone_number) => self.store.find_by_phone(&phone_number).await?,
            None => None,
        };
        let Some(user) = user else {
            return Err(WebhookError::new(
                WebhookErrorKind::UserNotFound,
                format!("{phone_number} is not registered"),
            ));
        };
        Ok(self.store.recent(user.id, usize::MAX).await?)
    }

    async fn complete(&self, req: &CompletionRequest) -> String {
        let fut = self.provider.complete(req);
        let result = async move {
            trace!("sending request with {} prior turns", req.history.len());
            fut.await
        }
        .instrument(debug_span!("completion"))
        .await;
        match result {
            Ok(reply) => reply,
            Err(err) => {
                error!("completion failed ({:?}): {err}", err.kind());
                FALLBACK_REPLY.to_owned()
            }
        }
    }
}
