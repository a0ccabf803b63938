//! A completion provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use callrelay_model::{
    CompletionProvider, CompletionRequest, ErrorKind, ProviderError,
};
use mime::Mime;
use reqwest::{Client, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::ChatCompletion;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible completion provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl CompletionProvider for OpenAIProvider {
    type Error = Error;

    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::ACCEPT, "application/json")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::new(
                    "Rate limit exceeded",
                    ErrorKind::RateLimitExceeded,
                ));
            }
            let resp = resp
                .error_for_status()
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_json = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.type_() == mime::APPLICATION && m.subtype() == mime::JSON
                })
                .unwrap_or(false);
            if !is_json {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let completion: ChatCompletion = resp
                .json()
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
            extract_reply(completion)
        }
    }
}

fn extract_reply(completion: ChatCompletion) -> Result<String, Error> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new("No choices in response", ErrorKind::Other));
    };
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(Error::new("Reply was filtered", ErrorKind::Moderated));
    }
    let Some(content) = choice.message.content else {
        return Err(Error::new("Reply has no content", ErrorKind::Other));
    };
    trace!("finish reason: {:?}", choice.finish_reason);
    Ok(content)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn completion(value: serde_json::Value) -> ChatCompletion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_reply() {
        let reply = extract_reply(completion(json!({
            "choices": [{
                "message": { "content": "Sunny." },
                "finish_reason": "stop"
            }]
        })))
        .unwrap();
        assert_eq!(reply, "Sunny.");

        let err = extract_reply(completion(json!({
            "choices": [{
                "message": { "content": null },
                "finish_reason": "content_filter"
            }]
        })))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Moderated);

        let err = extract_reply(completion(json!({ "choices": [] })))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
