use std::sync::{Arc, Mutex};

use callrelay_model::ErrorKind;
use callrelay_test_model::{PresetReply, PresetScript, TestCompletionProvider};

use super::*;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Outbound {
    Conversation(String),
    Participant(String, String),
    Message(String, String, String),
}

#[derive(Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<Outbound>>>,
    fail_sends: bool,
}

impl Recorder {
    fn log(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| match entry {
                Outbound::Message(_, body, _) => Some(body),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl OutboundMessenger for Recorder {
    async fn create_conversation(
        &self,
        friendly_name: &str,
    ) -> Result<String, OutboundError> {
        let mut log = self.log.lock().unwrap();
        log.push(Outbound::Conversation(friendly_name.to_owned()));
        Ok(format!("CH{}", log.len()))
    }

    async fn add_participant(
        &self,
        conversation_sid: &str,
        phone_number: &str,
    ) -> Result<(), OutboundError> {
        self.log.lock().unwrap().push(Outbound::Participant(
            conversation_sid.to_owned(),
            phone_number.to_owned(),
        ));
        Ok(())
    }

    async fn send_message(
        &self,
        phone_number: &str,
        body: &str,
        conversation_sid: &str,
    ) -> Result<(), OutboundError> {
        if self.fail_sends {
            return Err(OutboundError::new("unreachable"));
        }
        self.log.lock().unwrap().push(Outbound::Message(
            phone_number.to_owned(),
            body.to_owned(),
            conversation_sid.to_owned(),
        ));
        Ok(())
    }
}

type Service =
    MessagingService<TestCompletionProvider, InMemoryStore, Recorder>;

fn service(replies: Vec<PresetReply>) -> (Service, TestCompletionProvider, Recorder) {
    let provider =
        TestCompletionProvider::with_script(PresetScript::with_replies(replies));
    let recorder = Recorder::default();
    let service = MessagingService::new(
        provider.clone(),
        InMemoryStore::default(),
        recorder.clone(),
    );
    (service, provider, recorder)
}

fn inbound(conversation_sid: &str, body: &str) -> InboundMessage {
    InboundMessage {
        author: "+15551234567".to_owned(),
        body: body.to_owned(),
        conversation_sid: conversation_sid.to_owned(),
        message_sid: "IM1".to_owned(),
        image_url: None,
    }
}

#[test]
fn test_normalize_phone() {
    assert_eq!(normalize_phone("+447700900123").unwrap(), "+447700900123");
    assert_eq!(normalize_phone("(555) 123-4567").unwrap(), "+15551234567");
    assert_eq!(normalize_phone(" 5551234567 ").unwrap(), "+15551234567");
    assert_eq!(normalize_phone("+"), None);
    assert_eq!(normalize_phone("n/a"), None);
}

#[test]
fn test_decode_inbound() {
    let inbound: InboundMessage = serde_json::from_value(serde_json::json!({
        "Author": "+15551234567",
        "Body": "Hi",
        "ConversationSid": "CH1",
        "MessageSid": "IM9"
    }))
    .unwrap();
    assert_eq!(inbound.body, "Hi");
    assert_eq!(inbound.conversation_sid, "CH1");
    assert_eq!(inbound.image_url, None);
}

#[tokio::test]
async fn test_register() {
    let (service, _, recorder) = service(vec![]);

    let user = service.register("555-123-4567").await.unwrap();
    assert_eq!(user.phone_number, "+15551234567");
    assert_eq!(user.conversation_sid, "CH1");
    assert!(user.is_active);
    assert_eq!(
        recorder.log(),
        vec![
            Outbound::Conversation(
                "Conversation for +15551234567".to_owned()
            ),
            Outbound::Participant("CH1".to_owned(), "+15551234567".to_owned()),
            Outbound::Message(
                "+15551234567".to_owned(),
                WELCOME_MESSAGE.to_owned(),
                "CH1".to_owned()
            ),
        ]
    );

    let err = service.register("+15551234567").await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::AlreadyRegistered);
    let err = service.register("").await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::InvalidRequest);
    assert_eq!(recorder.log().len(), 3);
}

#[tokio::test]
async fn test_reply_with_history() {
    let (service, provider, recorder) = service(vec![
        PresetReply::reply("Hello!"),
        PresetReply::reply("It is sunny."),
    ]);
    let user = service.register("+15551234567").await.unwrap();

    let outcome = service.handle(inbound("CH1", "Hi")).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Replied("Hello!".to_owned()));
    let outcome = service
        .handle(inbound("CH1", "Weather?"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Replied("It is sunny.".to_owned()));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].system, SYSTEM_PROMPT);
    assert!(requests[0].history.is_empty());
    assert_eq!(requests[0].input.text, "Hi");
    assert_eq!(
        requests[1].history,
        vec![
            ChatTurn {
                speaker: Speaker::User,
                content: "Hi".to_owned()
            },
            ChatTurn {
                speaker: Speaker::Assistant,
                content: "Hello!".to_owned()
            },
        ]
    );
    assert_eq!(requests[1].input.text, "Weather?");

    assert_eq!(
        recorder.messages(),
        vec![WELCOME_MESSAGE, "Hello!", "It is sunny."]
    );

    let history = service.history(&user.phone_number).await.unwrap();
    let contents: Vec<_> =
        history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["Hi", "Hello!", "Weather?", "It is sunny."]);
    assert_eq!(history[0].from, Speaker::User);
    assert_eq!(history[3].from, Speaker::Assistant);
}

#[tokio::test]
async fn test_history_is_capped() {
    let replies = (0..7).map(|i| PresetReply::reply(format!("r{i}"))).collect();
    let (service, provider, _) = service(replies);
    service.register("+15551234567").await.unwrap();

    for i in 0..7 {
        service
            .handle(inbound("CH1", &format!("m{i}")))
            .await
            .unwrap();
    }

    let requests = provider.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.history.len(), HISTORY_LIMIT);
    assert_eq!(last.history[0].content, "m1");
    assert_eq!(last.history[9].content, "r5");
}

#[tokio::test]
async fn test_own_messages_are_ignored() {
    let (service, provider, recorder) = service(vec![]);
    service.register("+15551234567").await.unwrap();

    let mut message = inbound("CH1", "Hello!");
    message.author = ASSISTANT_AUTHOR.to_owned();
    let outcome = service.handle(message).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert!(provider.requests().is_empty());
    assert_eq!(recorder.messages(), vec![WELCOME_MESSAGE]);
}

#[tokio::test]
async fn test_invalid_requests() {
    let (service, _, _) = service(vec![]);

    let err = service.handle(inbound("", "Hi")).await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::InvalidRequest);
    let err = service.handle(inbound("CH1", "")).await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::InvalidRequest);
    let err = service.handle(inbound("CH404", "Hi")).await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::UserNotFound);
    let err = service.history("+15550000000").await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::UserNotFound);
}

#[tokio::test]
async fn test_provider_failure_falls_back() {
    let (service, _, recorder) =
        service(vec![PresetReply::Failure(ErrorKind::RateLimitExceeded)]);
    service.register("+15551234567").await.unwrap();

    let mut message = inbound("CH1", "What is this?");
    message.image_url = Some("https://example.com/cat.png".to_owned());
    let outcome = service.handle(message).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Replied(FALLBACK_REPLY.to_owned()));
    assert_eq!(recorder.messages(), vec![WELCOME_MESSAGE, FALLBACK_REPLY]);

    let history = service.history("+15551234567").await.unwrap();
    assert_eq!(
        history[0].image_url.as_deref(),
        Some("https://example.com/cat.png")
    );
    assert_eq!(history[1].content, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_outbound_failure() {
    let provider = TestCompletionProvider::with_script(
        PresetScript::with_replies([PresetReply::reply("Hello!")]),
    );
    let store = InMemoryStore::default();
    store
        .insert_user("+15551234567", "CH1", Utc::now())
        .await
        .unwrap();
    let recorder = Recorder {
        fail_sends: true,
        ..Default::default()
    };
    let service = MessagingService::new(provider, store, recorder)
        .with_system_prompt("Reply in French.");

    let err = service.handle(inbound("CH1", "Hi")).await.unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::Outbound);
    let user = service
        .store()
        .find_by_conversation("CH1")
        .await
        .unwrap()
        .unwrap();
    let stored = service.store().recent(user.id, 10).await.unwrap();
    assert_eq!(stored.len(), 2);
}
