//! A local fake completion provider for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callrelay_model::{
    CompletionProvider, CompletionRequest, ErrorKind, ProviderError,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A local fake completion provider for testing purpose.
///
/// Replies are handed out in the order they were added, one per request.
/// A request arriving after the script is exhausted fails. Every request
/// is recorded and can be inspected with [`requests`].
///
/// Clones share the same script and request log.
///
/// [`requests`]: TestCompletionProvider::requests
#[derive(Clone, Default)]
pub struct TestCompletionProvider {
    script: Arc<Mutex<VecDeque<PresetReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

impl TestCompletionProvider {
    /// Creates a provider that plays the given script.
    pub fn with_script(script: PresetScript) -> Self {
        let provider = Self::default();
        for reply in script.replies {
            provider.add_reply(reply);
        }
        provider
    }

    #[inline]
    pub fn add_reply(&self, reply: PresetReply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl CompletionProvider for TestCompletionProvider {
    type Error = crate::Error;

    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move {
            sleep(delay).await;
            match next {
                Some(PresetReply::Reply(text)) => Ok(text),
                Some(PresetReply::Failure(kind)) => Err(Error {
                    message: "scripted failure",
                    kind,
                }),
                None => Err(Error {
                    message: "no enough replies",
                    kind: ErrorKind::Other,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use callrelay_model::UserInput;

    use super::*;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            system: "Be brief.".to_owned(),
            history: vec![],
            input: UserInput {
                text: text.to_owned(),
                image_url: None,
            },
        }
    }

    #[tokio::test]
    async fn test_complete() {
        let provider = TestCompletionProvider::with_script(
            PresetScript::with_replies([
                PresetReply::reply("Hello, world!"),
                PresetReply::Failure(ErrorKind::Moderated),
            ]),
        );

        let reply = provider.complete(&request("Hi")).await.unwrap();
        assert_eq!(reply, "Hello, world!");

        let err = provider.complete(&request("Hmm")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Moderated);

        let err = provider.complete(&request("Anyone?")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].input.text, "Hmm");
    }
}
