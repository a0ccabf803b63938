use serde::{Deserialize, Serialize};

/// The kind of a conversation item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A message from the user, the assistant, or a tool.
    Message,
    /// A tool invocation requested by the model.
    FunctionCall,
    /// The result supplied for a pending function call.
    FunctionCallOutput,
}

/// The speaker of a conversation item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The system instructions.
    System,
    /// The caller.
    User,
    /// The model.
    Assistant,
    /// A function call output rendered for display.
    Tool,
}

/// Whether an item is still receiving updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// The item may receive more fragments.
    #[default]
    Running,
    /// The item is final.
    Completed,
}

/// One piece of textual content within an item.
///
/// The realtime protocol uses several part shapes (`text`, `input_text`,
/// `input_audio`, `audio`). Audio parts carry their text in a
/// `transcript` field, which is folded into [`ContentPart::text`] while
/// decoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawContentPart")]
pub struct ContentPart {
    /// The part kind, e.g. `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The text of this part. Empty when the part carries no text.
    pub text: String,
}

impl ContentPart {
    /// Creates a `text` part.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            kind: "text".to_owned(),
            text: text.into(),
        }
    }

    /// Returns `true` if this is a plain `text` part.
    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

#[derive(Deserialize)]
struct RawContentPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
}

impl From<RawContentPart> for ContentPart {
    fn from(raw: RawContentPart) -> Self {
        Self {
            kind: raw.kind.unwrap_or_else(|| "text".to_owned()),
            text: raw.text.or(raw.transcript).unwrap_or_default(),
        }
    }
}

/// Kind-specific fields of a [`ConversationItem`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemDetail {
    /// A plain message.
    Message,
    /// A function call request.
    FunctionCall {
        /// Identifier correlating the call with its output.
        call_id: String,
        /// The function name.
        name: String,
        /// Raw serialized JSON arguments.
        arguments: String,
    },
    /// A function call result.
    FunctionCallOutput {
        /// Identifier of the call this output answers.
        call_id: String,
        /// Raw serialized JSON output.
        output: String,
    },
}

impl ItemDetail {
    /// Returns the kind of item these fields belong to.
    #[inline]
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemDetail::Message => ItemKind::Message,
            ItemDetail::FunctionCall { .. } => ItemKind::FunctionCall,
            ItemDetail::FunctionCallOutput { .. } => {
                ItemKind::FunctionCallOutput
            }
        }
    }

    /// Returns the call id for function call items and their outputs.
    #[inline]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            ItemDetail::Message => None,
            ItemDetail::FunctionCall { call_id, .. }
            | ItemDetail::FunctionCallOutput { call_id, .. } => Some(call_id),
        }
    }
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Stable identifier, absent for synthesized items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub detail: ItemDetail,
    /// Who this item is displayed as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text fragments in append order.
    #[serde(default)]
    pub content: Vec<ContentPart>,
    /// Completion status.
    #[serde(default)]
    pub status: ItemStatus,
    /// Display-formatted creation time.
    #[serde(default)]
    pub timestamp: String,
}

impl ConversationItem {
    /// Returns the kind of this item.
    #[inline]
    pub fn kind(&self) -> ItemKind {
        self.detail.kind()
    }

    /// Returns the call id of function call items and their outputs.
    #[inline]
    pub fn call_id(&self) -> Option<&str> {
        self.detail.call_id()
    }

    /// Concatenates all fragments into the display text.
    pub fn text(&self) -> String {
        self.content.iter().map(|part| part.text.as_str()).collect()
    }
}
