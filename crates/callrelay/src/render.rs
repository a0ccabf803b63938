//! Plain-text rendering of transcript items and function calls.

use callrelay_core::FunctionCallView;
use callrelay_model::{ConversationItem, ItemKind, ItemStatus, Role};

/// Returns a short label naming who produced the item.
pub fn speaker_label(item: &ConversationItem) -> &'static str {
    if item.kind() == ItemKind::FunctionCall {
        return "Function";
    }
    match item.role {
        Some(Role::User) => "You",
        Some(Role::Assistant) => "Assistant",
        Some(Role::Tool) => "Tool",
        Some(Role::System) => "System",
        None => "Unknown",
    }
}

/// Formats an item as a single transcript line.
pub fn format_item(item: &ConversationItem) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        item.timestamp,
        speaker_label(item),
        item.text()
    );
    if item.status == ItemStatus::Running {
        line.push_str(" …");
    }
    line
}

/// Formats a function call with its arguments and response.
pub fn format_call(call: &FunctionCallView) -> String {
    let state = if call.completed { "completed" } else { "pending" };
    let mut text = format!(
        "{} ({}) {state}\narguments: {}",
        call.name,
        call.call_id,
        call.pretty_arguments()
    );
    if let Some(response) = call.pretty_response() {
        text.push_str("\nresponse: ");
        text.push_str(&response);
    }
    text
}

#[cfg(test)]
mod tests {
    use callrelay_model::{ContentPart, ItemDetail};

    use super::*;

    fn item(role: Role, text: &str, status: ItemStatus) -> ConversationItem {
        ConversationItem {
            id: Some("i1".to_owned()),
            detail: ItemDetail::Message,
            role: Some(role),
            content: vec![ContentPart::text(text)],
            status,
            timestamp: "9:41:00 AM".to_owned(),
        }
    }

    #[test]
    fn test_format_item() {
        let line = format_item(&item(Role::User, "Hi", ItemStatus::Completed));
        assert_eq!(line, "[9:41:00 AM] You: Hi");

        let line =
            format_item(&item(Role::Assistant, "Hel", ItemStatus::Running));
        assert_eq!(line, "[9:41:00 AM] Assistant: Hel …");

        let mut call = item(Role::Assistant, "f({})", ItemStatus::Running);
        call.detail = ItemDetail::FunctionCall {
            call_id: "c1".to_owned(),
            name: "f".to_owned(),
            arguments: "{}".to_owned(),
        };
        assert_eq!(speaker_label(&call), "Function");
    }

    #[test]
    fn test_format_call() {
        let call = FunctionCallView {
            call_id: "c1".to_owned(),
            name: "get_weather".to_owned(),
            arguments: r#"{"city":"Oslo"}"#.to_owned(),
            completed: true,
            response: Some(r#""Cloudy""#.to_owned()),
        };
        assert_eq!(
            format_call(&call),
            "get_weather (c1) completed\narguments: {\n  \"city\": \"Oslo\"\n}\nresponse: \"Cloudy\""
        );
    }
}
