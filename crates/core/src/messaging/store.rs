use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Mutex;

use async_trait::async_trait;
use callrelay_model::Speaker;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifier of a registered user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserId(
    /// The raw id.
    pub u64,
);

/// A phone number registered for text conversations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    /// Store-assigned identifier.
    pub id: UserId,
    /// Normalized phone number.
    pub phone_number: String,
    /// Provider conversation the user texts through.
    pub conversation_sid: String,
    /// Whether the user still receives replies.
    pub is_active: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the latest inbound message.
    pub last_interaction: DateTime<Utc>,
}

/// A persisted text message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    /// Message text.
    pub content: String,
    /// Who wrote the message.
    pub from: Speaker,
    /// An image attached to the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// When the message was stored.
    pub timestamp: DateTime<Utc>,
}

/// A message store operation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StoreError {}

/// Persistence for users and their message history.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts a new user.
    async fn insert_user(
        &self,
        phone_number: &str,
        conversation_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    /// Looks a user up by phone number.
    async fn find_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Looks a user up by the id of their provider conversation.
    async fn find_by_conversation(
        &self,
        conversation_sid: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Records the time of the user's latest message.
    async fn touch(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Appends a message to the user's history.
    async fn append(
        &self,
        user: UserId,
        message: StoredMessage,
    ) -> Result<(), StoreError>;

    /// Returns the latest `limit` messages in chronological order.
    async fn recent(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    messages: HashMap<UserId, Vec<StoredMessage>>,
}

/// A [`MessageStore`] kept in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    fn with_inner<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::new("store lock is poisoned"))?;
        f(&mut inner)
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert_user(
        &self,
        phone_number: &str,
        conversation_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.with_inner(|inner| {
            if inner.users.iter().any(|u| u.phone_number == phone_number) {
                return Err(StoreError::new(format!(
                    "duplicate phone number {phone_number}"
                )));
            }
            let user = User {
                id: UserId(inner.users.len() as u64 + 1),
                phone_number: phone_number.to_owned(),
                conversation_sid: conversation_sid.to_owned(),
                is_active: true,
                created_at: now,
                last_interaction: now,
            };
            inner.users.push(user.clone());
            Ok(user)
        })
    }

    async fn find_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<User>, StoreError> {
        self.with_inner(|inner| {
            Ok(inner
                .users
                .iter()
                .find(|u| u.phone_number == phone_number)
                .cloned())
        })
    }

    async fn find_by_conversation(
        &self,
        conversation_sid: &str,
    ) -> Result<Option<User>, StoreError> {
        self.with_inner(|inner| {
            Ok(inner
                .users
                .iter()
                .find(|u| u.conversation_sid == conversation_sid)
                .cloned())
        })
    }

    async fn touch(
        &self,
        id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
                return Err(StoreError::new(format!("no user {}", id.0)));
            };
            user.last_interaction = now;
            Ok(())
        })
    }

    async fn append(
        &self,
        user: UserId,
        message: StoredMessage,
    ) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner.messages.entry(user).or_default().push(message);
            Ok(())
        })
    }

    async fn recent(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        self.with_inner(|inner| {
            let Some(messages) = inner.messages.get(&user) else {
                return Ok(vec![]);
            };
            let mut recent = messages.clone();
            // Stable, so messages sharing a timestamp keep insertion order.
            recent.sort_by_key(|m| m.timestamp);
            let skip = recent.len().saturating_sub(limit);
            Ok(recent.split_off(skip))
        })
    }
}
