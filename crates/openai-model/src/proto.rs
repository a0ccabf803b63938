use callrelay_model::{CompletionRequest, Speaker, UserInput};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum Message {
    System { content: String },
    User { content: Content },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

// -----------
// Conversions
// -----------

pub fn create_request(
    req: &CompletionRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    messages.push(Message::System {
        content: req.system.clone(),
    });
    messages.extend(req.history.iter().map(|turn| match turn.speaker {
        Speaker::User => Message::User {
            content: Content::Text(turn.content.clone()),
        },
        Speaker::Assistant => Message::Assistant {
            content: turn.content.clone(),
        },
    }));
    messages.push(Message::User {
        content: create_user_content(&req.input),
    });
    ChatCompletionRequest {
        model: config.model.clone(),
        messages,
        max_tokens: config.max_tokens,
    }
}

#[inline]
fn create_user_content(input: &UserInput) -> Content {
    let Some(url) = &input.image_url else {
        return Content::Text(input.text.clone());
    };
    Content::Parts(vec![
        ContentPart::Text {
            text: input.text.clone(),
        },
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        },
    ])
}

#[cfg(test)]
mod tests {
    use callrelay_model::ChatTurn;
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = CompletionRequest {
            system: "You are a helpful assistant.".to_owned(),
            history: vec![
                ChatTurn {
                    speaker: Speaker::User,
                    content: "Hello".to_owned(),
                },
                ChatTurn {
                    speaker: Speaker::Assistant,
                    content: "Hi!".to_owned(),
                },
            ],
            input: UserInput {
                text: "What is this?".to_owned(),
                image_url: Some("https://example.com/cat.png".to_owned()),
            },
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .with_max_tokens(64)
            .build();

        let value =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "custom",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi!" },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text", "text": "What is this?" },
                            {
                                "type": "image_url",
                                "image_url": { "url": "https://example.com/cat.png" }
                            }
                        ]
                    }
                ],
                "max_tokens": 64
            })
        );
    }

    #[test]
    fn test_decode_completion() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Sunny." },
                "finish_reason": "stop"
            }]
        }))
        .unwrap();
        assert_eq!(completion.choices.len(), 1);
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("Sunny."));
        assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
