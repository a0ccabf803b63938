use callrelay_model::ErrorKind;
use serde::{Deserialize, Serialize};

/// The scripted outcome of one completion request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetReply {
    /// The request succeeds with this text.
    #[serde(rename = "reply")]
    Reply(String),
    /// The request fails with an error of this kind.
    #[serde(rename = "failure")]
    Failure(ErrorKind),
}

impl PresetReply {
    /// Creates a successful reply.
    #[inline]
    pub fn reply<S: Into<String>>(text: S) -> Self {
        Self::Reply(text.into())
    }
}

/// A sequence of scripted replies, consumed in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetScript {
    /// Replies in the order they are handed out.
    pub replies: Vec<PresetReply>,
}

impl PresetScript {
    /// Creates a script with the specified replies.
    #[inline]
    pub fn with_replies(replies: impl Into<Vec<PresetReply>>) -> Self {
        Self {
            replies: replies.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_script() {
        let script: PresetScript = serde_json::from_value(json!({
            "replies": [
                { "type": "reply", "data": "Sure, it's sunny." },
                { "type": "failure", "data": "rate_limit_exceeded" }
            ]
        }))
        .unwrap();

        assert_eq!(
            script,
            PresetScript::with_replies([
                PresetReply::reply("Sure, it's sunny."),
                PresetReply::Failure(ErrorKind::RateLimitExceeded),
            ])
        );
    }
}
