use log::error;
use uuid::Uuid;

use super::transport::ChatTransport;
use crate::models::chat::{ ChatMessage, Role };

pub const GREETING_ID: &str = "greeting";
pub const APOLOGY: &str = "申し訳ありません。エラーが発生しました。もう一度お試しください。";

/// A rendered line in the chat window. Never mutated once appended.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input or a request already in flight.
    Ignored,
    Replied,
    Failed,
}

/// In-memory state of one chat window. Starts from a fixed greeting and is never persisted.
pub struct ChatSession {
    messages: Vec<Message>,
    pending: bool,
    input: String,
}

pub fn greeting(clinic_name: &str) -> String {
    format!(
        "こんにちは。{} AIコンシェルジュです。\nお肌のお悩みや、施術についてのご質問はありますか？",
        clinic_name
    )
}

impl ChatSession {
    pub fn new(clinic_name: &str) -> Self {
        Self {
            messages: vec![Message {
                id: GREETING_ID.to_string(),
                role: Role::Assistant,
                content: greeting(clinic_name),
            }],
            pending: false,
            input: String::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Mirrors the disabled state of the send button.
    pub fn can_submit(&self) -> bool {
        !self.pending && !self.input.trim().is_empty()
    }

    /// Conversation as sent upstream: everything except the greeting.
    pub fn outgoing(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.id != GREETING_ID)
            .map(|m| ChatMessage { role: m.role, content: m.content.clone() })
            .collect()
    }

    pub async fn submit<T: ChatTransport + ?Sized>(&mut self, transport: &T) -> SubmitOutcome {
        if !self.can_submit() {
            return SubmitOutcome::Ignored;
        }

        let text = std::mem::take(&mut self.input);
        self.messages.push(Message::new(Role::User, text));
        self.pending = true;

        let outcome = match transport.send(&self.outgoing()).await {
            Ok(content) => {
                self.messages.push(Message::new(Role::Assistant, content));
                SubmitOutcome::Replied
            }
            Err(e) => {
                error!("Chat request failed: {}", e);
                self.messages.push(Message::new(Role::Assistant, APOLOGY));
                SubmitOutcome::Failed
            }
        };
        self.pending = false;
        outcome
    }
}
