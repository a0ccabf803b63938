//! Transcript reconstruction from realtime call events.


use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use callrelay_model::{
    ContentPart, ConversationItem, ItemDetail, ItemKind, ItemStatus,
    RealtimeItem, Role, ServerEvent,
};
use serde_json::Value;

/// Placeholder text shown while the caller is still speaking.
pub const SPEECH_PLACEHOLDER: &str = "...";

/// A source of display timestamps for newly created items.
pub type Clock = fn() -> String;

/// Formats the current local time, e.g. `3:04:05 PM`.
pub fn local_time() -> String {
    chrono::Local::now().format("%-I:%M:%S %p").to_string()
}

/// The ordered list of conversation items of one call session.
///
/// Items are kept in arrival order. An auxiliary index maps item ids to
/// the position of the first item carrying that id, so lookups stay cheap
/// as the transcript grows.
#[derive(Clone)]
pub struct Transcript {
    items: Vec<ConversationItem>,
    index: HashMap<String, usize>,
    clock: Clock,
}

impl Default for Transcript {
    #[inline]
    fn default() -> Self {
        Self::with_clock(local_time)
    }
}

impl Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Transcript {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Transcript {}

impl Transcript {
    /// Creates an empty transcript stamping new items with `clock`.
    #[inline]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            clock,
        }
    }

    /// Returns the items in arrival order.
    #[inline]
    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the transcript has no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the first item with the given id.
    #[inline]
    pub fn get(&self, id: &str) -> Option<&ConversationItem> {
        self.index.get(id).map(|&idx| &self.items[idx])
    }

    /// Copies the current items into an immutable snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<[ConversationItem]> {
        Arc::from(self.items.as_slice())
    }

    /// Discards every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Applies one event and returns the resulting transcript.
    #[inline]
    pub fn reduce(mut self, event: &ServerEvent) -> Self {
        self.apply(event);
        self
    }

    /// Applies one event in place.
    ///
    /// Returns `true` if the transcript changed. Events that cannot be
    /// applied are dropped, this method never fails.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        trace!("applying event: {event:?}");
        match event {
            ServerEvent::SessionCreated {} => {
                let changed = !self.items.is_empty();
                self.clear();
                changed
            }
            ServerEvent::SpeechStarted { item_id } => {
                let item = self.new_item(
                    Some(item_id.clone()),
                    ItemDetail::Message,
                    Role::User,
                    ContentPart::text(SPEECH_PLACEHOLDER),
                    ItemStatus::Running,
                );
                self.push(item);
                true
            }
            ServerEvent::ItemCreated { item } => match item {
                RealtimeItem::Message { id, role, content } => {
                    self.merge_message(id, *role, content);
                    true
                }
                RealtimeItem::FunctionCallOutput {
                    id,
                    call_id,
                    output,
                } => {
                    self.add_function_output(id, call_id, output);
                    true
                }
                // Function calls are recorded once their output item is done.
                RealtimeItem::FunctionCall { .. } | RealtimeItem::Other => {
                    false
                }
            },
            ServerEvent::TranscriptionCompleted {
                item_id,
                transcript,
            } => self.complete_user_speech(item_id, transcript),
            ServerEvent::ContentPartAdded {
                item_id,
                output_index,
                part,
            } => {
                if *output_index != 0 || !part.is_text() {
                    return false;
                }
                self.append_or_create(item_id, part.clone());
                true
            }
            ServerEvent::AudioTranscriptDelta {
                item_id,
                output_index,
                delta,
            } => {
                if *output_index != 0 || delta.is_empty() {
                    return false;
                }
                self.append_or_create(item_id, ContentPart::text(delta));
                true
            }
            ServerEvent::OutputItemDone { item } => match item {
                RealtimeItem::FunctionCall {
                    id,
                    call_id,
                    name,
                    arguments,
                } => self.add_function_call(id, call_id, name, arguments),
                _ => false,
            },
            ServerEvent::Unknown => false,
        }
    }

    fn merge_message(
        &mut self,
        id: &Option<String>,
        role: Option<Role>,
        content: &Option<Vec<ContentPart>>,
    ) {
        let content = content.clone().unwrap_or_default();
        let existing = id.as_deref().and_then(|id| self.index.get(id)).copied();
        let Some(idx) = existing else {
            let item = ConversationItem {
                id: id.clone(),
                detail: ItemDetail::Message,
                role,
                content,
                status: ItemStatus::Completed,
                timestamp: (self.clock)(),
            };
            self.push(item);
            return;
        };

        let now = self.clock;
        let item = &mut self.items[idx];
        item.detail = ItemDetail::Message;
        item.role = role.or(item.role);
        item.content = content;
        item.status = ItemStatus::Completed;
        if item.timestamp.is_empty() {
            item.timestamp = now();
        }
    }

    fn add_function_output(
        &mut self,
        id: &Option<String>,
        call_id: &str,
        output: &str,
    ) {
        let item = self.new_item(
            id.clone(),
            ItemDetail::FunctionCallOutput {
                call_id: call_id.to_owned(),
                output: output.to_owned(),
            },
            Role::Tool,
            ContentPart::text(format!("Function call response: {output}")),
            ItemStatus::Completed,
        );
        self.push(item);

        let mut matched = false;
        for item in &mut self.items {
            if item.kind() == ItemKind::FunctionCall
                && item.call_id() == Some(call_id)
            {
                item.status = ItemStatus::Completed;
                matched = true;
            }
        }
        if !matched {
            debug!("no function call matches output for `{call_id}`");
        }
    }

    fn complete_user_speech(&mut self, item_id: &str, transcript: &str) -> bool {
        let mut matched = false;
        for item in &mut self.items {
            if item.id.as_deref() == Some(item_id)
                && item.kind() == ItemKind::Message
                && item.role == Some(Role::User)
            {
                item.content = vec![ContentPart::text(transcript)];
                item.status = ItemStatus::Completed;
                matched = true;
            }
        }
        matched
    }

    fn append_or_create(&mut self, item_id: &str, part: ContentPart) {
        if let Some(&idx) = self.index.get(item_id) {
            self.items[idx].content.push(part);
            return;
        }
        let item = self.new_item(
            Some(item_id.to_owned()),
            ItemDetail::Message,
            Role::Assistant,
            part,
            ItemStatus::Running,
        );
        self.push(item);
    }

    fn add_function_call(
        &mut self,
        id: &Option<String>,
        call_id: &str,
        name: &str,
        arguments: &str,
    ) -> bool {
        let parsed = match serde_json::from_str::<Value>(arguments) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("dropping function call `{name}`, bad arguments: {err}");
                return false;
            }
        };
        let item = self.new_item(
            id.clone(),
            ItemDetail::FunctionCall {
                call_id: call_id.to_owned(),
                name: name.to_owned(),
                arguments: arguments.to_owned(),
            },
            Role::Assistant,
            ContentPart::text(format!("{name}({parsed})")),
            ItemStatus::Running,
        );
        self.push(item);
        true
    }

    #[inline]
    fn new_item(
        &self,
        id: Option<String>,
        detail: ItemDetail,
        role: Role,
        part: ContentPart,
        status: ItemStatus,
    ) -> ConversationItem {
        ConversationItem {
            id,
            detail,
            role: Some(role),
            content: vec![part],
            status,
            timestamp: (self.clock)(),
        }
    }

    fn push(&mut self, item: ConversationItem) {
        if let Some(id) = &item.id {
            // Lookups resolve to the first item carrying an id.
            self.index.entry(id.clone()).or_insert(self.items.len());
        }
        self.items.push(item);
    }
}

/// Applies `event` to `transcript` and returns the next transcript.
#[inline]
pub fn reduce(transcript: Transcript, event: &ServerEvent) -> Transcript {
    transcript.reduce(event)
}
