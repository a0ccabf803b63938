//! A terminal front end for replaying recorded calls and chatting with the
//! text messaging service.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use callrelay::CallSessionBuilder;
use callrelay::render::{format_call, format_item};
use callrelay_core::messaging::{
    InMemoryStore, InboundMessage, MessagingService, OutboundError,
    OutboundMessenger, WebhookOutcome,
};
use callrelay_core::{CallStatus, PendingResponses};
use callrelay_model::{ConversationItem, ItemStatus, Role};
use callrelay_openai::{OpenAIConfigBuilder, OpenAIProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const DEFAULT_PHONE: &str = "+15555550100";
const USAGE: &str =
    "usage: callrelay replay <events.jsonl> | callrelay chat [phone]";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("replay") => {
            let Some(path) = args.get(1) else {
                eprintln!("{USAGE}");
                return;
            };
            replay(path).await;
        }
        Some("chat") => {
            let phone = args.get(1).map_or(DEFAULT_PHONE, String::as_str);
            chat(phone).await;
        }
        _ => eprintln!("{USAGE}"),
    }
}

async fn replay(path: &str) {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return;
        }
    };

    let mut session = CallSessionBuilder::default().build();
    if let Err(err) = session.start().await {
        eprintln!("failed to start session: {err}");
        return;
    }
    print_outbound(session.drain_outbound());

    let relay = session.relay().clone();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        if relay.push_json(line).is_err() {
            break;
        }
    }

    loop {
        let Ok(snapshot) = relay.snapshot().await else {
            break;
        };
        print_transcript(&snapshot.items, snapshot.status);

        let Some(call) = snapshot.function_calls().into_iter().find(|call| {
            PendingResponses::accepts_response(&snapshot.items, &call.call_id)
        }) else {
            break;
        };

        let bar = BAR_CHAR.bright_yellow();
        println!("\n{bar}🛠  Function call awaiting a response:");
        for line in format_call(&call).lines() {
            println!("{bar}{}", line.bright_white());
        }
        print!("Response: ");
        std::io::stdout().flush().ok();

        let Some(response) = read_line().await else {
            break;
        };
        if relay.set_draft(&call.call_id, response.trim()).is_err() {
            break;
        }
        if let Err(err) = relay.submit_response(&call.call_id).await {
            println!("{}", err.red());
            continue;
        }
        print_outbound(session.drain_outbound());

        // No server echoes the output back during a replay.
        if let Some(echo) = echo_output(&call.call_id, response.trim()) {
            relay.push_json(&echo).ok();
        }
    }

    session.close();
}

fn echo_output(call_id: &str, response: &str) -> Option<String> {
    let output = serde_json::to_string(response).ok()?;
    let event = serde_json::json!({
        "type": "conversation.item.created",
        "item": {
            "type": "function_call_output",
            "call_id": call_id,
            "output": output,
        }
    });
    Some(event.to_string())
}

fn print_transcript(items: &[ConversationItem], status: CallStatus) {
    println!("{}", format!("── transcript ({status:?}) ──").dimmed());
    for item in items {
        let line = format_item(item);
        match (item.role, item.status) {
            (_, ItemStatus::Running) => println!("{}", line.dimmed()),
            (Some(Role::User), _) => println!("{}", line.bright_green()),
            (Some(Role::Tool), _) => println!("{}", line.bright_yellow()),
            _ => println!("{}", line.bright_cyan()),
        }
    }
}

fn print_outbound(lines: Vec<String>) {
    for line in lines {
        println!("{} {}", "→".bright_magenta(), line.dimmed());
    }
}

/// Prints messages that would be delivered to the phone.
struct TerminalMessenger {
    next_sid: AtomicU64,
    message_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl OutboundMessenger for TerminalMessenger {
    async fn create_conversation(
        &self,
        friendly_name: &str,
    ) -> Result<String, OutboundError> {
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed);
        debug!("created conversation {friendly_name:?}");
        Ok(format!("CH{sid:032x}"))
    }

    async fn add_participant(
        &self,
        _conversation_sid: &str,
        _phone_number: &str,
    ) -> Result<(), OutboundError> {
        Ok(())
    }

    async fn send_message(
        &self,
        _phone_number: &str,
        body: &str,
        _conversation_sid: &str,
    ) -> Result<(), OutboundError> {
        self.message_tx
            .send(body.to_owned())
            .map_err(|_| OutboundError::new("terminal is gone"))
    }
}

async fn chat(phone: &str) {
    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    let provider = OpenAIProvider::new(config.build());

    let (message_tx, mut message_rx) = mpsc::unbounded_channel();
    let messenger = TerminalMessenger {
        next_sid: AtomicU64::new(1),
        message_tx,
    };
    let service =
        MessagingService::new(provider, InMemoryStore::default(), messenger);

    let user = match service.register(phone).await {
        Ok(user) => user,
        Err(err) => {
            eprintln!("failed to register {phone}: {err}");
            return;
        }
    };
    print_messages(&mut message_rx);

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut message_count = 0u64;
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let body = line.trim();
        if body.is_empty() {
            continue;
        }
        message_count += 1;

        let inbound = InboundMessage {
            author: user.phone_number.clone(),
            body: body.to_owned(),
            conversation_sid: user.conversation_sid.clone(),
            message_sid: format!("IM{message_count}"),
            image_url: None,
        };

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let handle = service.handle(inbound);
        tokio::pin!(handle);
        let result = loop {
            select! {
                result = &mut handle => break result,
                _ = sleep(Duration::from_millis(100)) => progress_bar.inc(1),
            }
        };
        progress_bar.finish_and_clear();

        match result {
            Ok(WebhookOutcome::Replied(_)) => print_messages(&mut message_rx),
            Ok(WebhookOutcome::Ignored) => {}
            Err(err) => {
                error!("failed to handle message: {err}");
                println!("{}", err.red());
            }
        }
    }
}

fn print_messages(message_rx: &mut mpsc::UnboundedReceiver<String>) {
    while let Ok(body) = message_rx.try_recv() {
        println!("{}🤖 {}", BAR_CHAR.bright_cyan(), body.bright_white());
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
