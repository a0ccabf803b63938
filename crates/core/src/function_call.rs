//! Function calls awaiting a user-supplied response.

mod error;

use std::collections::HashMap;

use callrelay_model::{ClientEvent, ConversationItem, ItemDetail, ItemStatus};
use serde_json::Value;

pub use error::{SubmitError, SubmitErrorKind};

/// A function call as presented for response entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionCallView {
    /// Identifier correlating the call with its output.
    pub call_id: String,
    /// The function name.
    pub name: String,
    /// Raw serialized JSON arguments.
    pub arguments: String,
    /// Whether the call has been answered.
    pub completed: bool,
    /// The raw output of the first answer, if any.
    pub response: Option<String>,
}

impl FunctionCallView {
    /// Returns the arguments pretty-printed, or verbatim if they are not
    /// valid JSON.
    #[inline]
    pub fn pretty_arguments(&self) -> String {
        pretty_json(&self.arguments)
    }

    /// Returns the response pretty-printed, if there is one.
    #[inline]
    pub fn pretty_response(&self) -> Option<String> {
        self.response.as_deref().map(pretty_json)
    }
}

fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| raw.to_owned())
}

/// Lists the function calls in `items` in transcript order.
///
/// A call counts as completed when its item is completed or when any
/// output with the same call id exists. The first such output is taken
/// as the response.
pub fn function_calls(items: &[ConversationItem]) -> Vec<FunctionCallView> {
    items
        .iter()
        .filter_map(|item| match &item.detail {
            ItemDetail::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                let response = first_output(items, call_id);
                Some(FunctionCallView {
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    completed: item.status == ItemStatus::Completed
                        || response.is_some(),
                    response: response.map(ToOwned::to_owned),
                })
            }
            _ => None,
        })
        .collect()
}

fn first_output<'a>(
    items: &'a [ConversationItem],
    call_id: &str,
) -> Option<&'a str> {
    items.iter().find_map(|item| match &item.detail {
        ItemDetail::FunctionCallOutput { call_id: id, output } if id == call_id => {
            Some(output.as_str())
        }
        _ => None,
    })
}

/// Response drafts keyed by the call id they answer.
///
/// A draft can only be submitted while its call is pending. Once the
/// transcript records the call as completed, the draft is withdrawn by
/// [`PendingResponses::retain_pending`].
#[derive(Clone, Debug, Default)]
pub struct PendingResponses {
    drafts: HashMap<String, String>,
}

impl PendingResponses {
    /// Records the text entered for a call.
    #[inline]
    pub fn set_draft<S1, S2>(&mut self, call_id: S1, text: S2)
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.drafts.insert(call_id.into(), text.into());
    }

    /// Returns the text entered for a call.
    #[inline]
    pub fn draft(&self, call_id: &str) -> Option<&str> {
        self.drafts.get(call_id).map(String::as_str)
    }

    /// Returns `true` if a response may currently be entered for the call.
    pub fn accepts_response(items: &[ConversationItem], call_id: &str) -> bool {
        function_calls(items)
            .iter()
            .any(|call| call.call_id == call_id && !call.completed)
    }

    /// Builds the outbound events answering `call_id`.
    ///
    /// The first event provides the output, the second asks the model to
    /// continue. The draft is kept until [`PendingResponses::finish`] is
    /// called, so a failed delivery can be retried.
    pub fn prepare(
        &self,
        items: &[ConversationItem],
        call_id: &str,
    ) -> Result<[ClientEvent; 2], SubmitError> {
        let calls = function_calls(items);
        let Some(call) = calls.iter().find(|call| call.call_id == call_id)
        else {
            return Err(SubmitError::new(SubmitErrorKind::UnknownCall, call_id));
        };
        if call.completed {
            return Err(SubmitError::new(
                SubmitErrorKind::AlreadyCompleted,
                call_id,
            ));
        }
        let Some(draft) = self.draft(call_id).filter(|text| !text.is_empty())
        else {
            return Err(SubmitError::new(
                SubmitErrorKind::EmptyResponse,
                call_id,
            ));
        };
        Ok([
            ClientEvent::function_call_output(call_id, draft),
            ClientEvent::ResponseCreate,
        ])
    }

    /// Forgets the draft of a submitted call.
    #[inline]
    pub fn finish(&mut self, call_id: &str) {
        self.drafts.remove(call_id);
    }

    /// Drops the drafts of calls that no longer accept a response.
    pub fn retain_pending(&mut self, items: &[ConversationItem]) {
        if self.drafts.is_empty() {
            return;
        }
        let calls = function_calls(items);
        self.drafts.retain(|call_id, _| {
            calls
                .iter()
                .any(|call| &call.call_id == call_id && !call.completed)
        });
    }
}

#[cfg(test)]
mod tests {
    use callrelay_model::{ContentPart, OutboundItem, Role};

    use super::*;

    fn call(call_id: &str, status: ItemStatus) -> ConversationItem {
        ConversationItem {
            id: Some(format!("item_{call_id}")),
            detail: ItemDetail::FunctionCall {
                call_id: call_id.to_owned(),
                name: "lookup".to_owned(),
                arguments: r#"{"q":"x"}"#.to_owned(),
            },
            role: Some(Role::Assistant),
            content: vec![ContentPart::text(r#"lookup({"q":"x"})"#)],
            status,
            timestamp: String::new(),
        }
    }

    fn output(call_id: &str, output: &str) -> ConversationItem {
        ConversationItem {
            id: None,
            detail: ItemDetail::FunctionCallOutput {
                call_id: call_id.to_owned(),
                output: output.to_owned(),
            },
            role: Some(Role::Tool),
            content: vec![],
            status: ItemStatus::Completed,
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_function_call_views() {
        let items = vec![
            call("c1", ItemStatus::Running),
            call("c2", ItemStatus::Running),
            call("c3", ItemStatus::Completed),
            output("c2", r#"{"a":1}"#),
            output("c2", "second"),
        ];
        let calls = function_calls(&items);
        assert_eq!(calls.len(), 3);
        assert!(!calls[0].completed);
        assert!(calls[1].completed);
        assert_eq!(calls[1].response.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(
            calls[1].pretty_response().unwrap(),
            "{\n  \"a\": 1\n}"
        );
        assert!(calls[2].completed);
        assert_eq!(calls[2].response, None);
        assert_eq!(calls[0].pretty_arguments(), "{\n  \"q\": \"x\"\n}");
    }

    #[test]
    fn test_prepare_submission() {
        let items = vec![call("c1", ItemStatus::Running)];
        let mut pending = PendingResponses::default();

        let err = pending.prepare(&items, "c1").unwrap_err();
        assert_eq!(err.kind(), SubmitErrorKind::EmptyResponse);

        pending.set_draft("c1", "");
        let err = pending.prepare(&items, "c1").unwrap_err();
        assert_eq!(err.kind(), SubmitErrorKind::EmptyResponse);

        pending.set_draft("c1", "72F");
        let [first, second] = pending.prepare(&items, "c1").unwrap();
        assert_eq!(
            first,
            ClientEvent::ItemCreate {
                item: OutboundItem::FunctionCallOutput {
                    call_id: "c1".to_owned(),
                    output: "\"72F\"".to_owned(),
                }
            }
        );
        assert_eq!(second, ClientEvent::ResponseCreate);
        assert_eq!(pending.draft("c1"), Some("72F"));

        pending.finish("c1");
        assert_eq!(pending.draft("c1"), None);

        let err = pending.prepare(&items, "nope").unwrap_err();
        assert_eq!(err.kind(), SubmitErrorKind::UnknownCall);
        assert_eq!(err.call_id(), "nope");
    }

    #[test]
    fn test_completed_calls_withdraw_drafts() {
        let mut items = vec![
            call("c1", ItemStatus::Running),
            call("c2", ItemStatus::Running),
        ];
        let mut pending = PendingResponses::default();
        pending.set_draft("c1", "one");
        pending.set_draft("c2", "two");
        assert!(PendingResponses::accepts_response(&items, "c1"));

        items[0].status = ItemStatus::Completed;
        assert!(!PendingResponses::accepts_response(&items, "c1"));
        let err = pending.prepare(&items, "c1").unwrap_err();
        assert_eq!(err.kind(), SubmitErrorKind::AlreadyCompleted);

        pending.retain_pending(&items);
        assert_eq!(pending.draft("c1"), None);
        assert_eq!(pending.draft("c2"), Some("two"));
    }
}
