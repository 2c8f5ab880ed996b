use thiserror::Error;

use crate::config::prompt::SystemPrompt;
use crate::models::chat::{ ChatMessage, Role };

/// Canned model turn that follows the system prompt when it is injected as a user turn.
pub const ACKNOWLEDGMENT: &str =
    "承知いたしました。提供されたクリニック情報データに基づき、AIコンシェルジュとして正確かつ丁寧にご案内いたします。";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("messages must not be empty")]
    Empty,
    #[error("the newest message must come from the user")]
    LastNotUser,
    #[error("the newest message is blank")]
    BlankMessage,
}

/// How the system prompt reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPromptMode {
    /// The provider has a dedicated system field.
    Native,
    /// Prompt goes in as a user turn followed by [`ACKNOWLEDGMENT`].
    SyntheticTurns,
}

impl SystemPromptMode {
    pub fn for_capability(supports_system_instruction: bool) -> Self {
        if supports_system_instruction {
            SystemPromptMode::Native
        } else {
            SystemPromptMode::SyntheticTurns
        }
    }
}

/// One upstream call: optional system channel, prior turns, and the live user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub system: Option<SystemPrompt>,
    pub history: Vec<ChatMessage>,
    pub live: String,
}

pub fn build_exchange(
    prompt: &SystemPrompt,
    messages: &[ChatMessage],
    mode: SystemPromptMode
) -> Result<Exchange, ConversationError> {
    let (newest, prior) = messages.split_last().ok_or(ConversationError::Empty)?;
    if newest.role != Role::User {
        return Err(ConversationError::LastNotUser);
    }
    if newest.content.trim().is_empty() {
        return Err(ConversationError::BlankMessage);
    }

    let (system, mut history) = match mode {
        SystemPromptMode::Native => (Some(prompt.clone()), Vec::with_capacity(prior.len())),
        SystemPromptMode::SyntheticTurns => {
            let mut head = Vec::with_capacity(prior.len() + 2);
            head.push(ChatMessage::user(prompt.as_str()));
            head.push(ChatMessage::assistant(ACKNOWLEDGMENT));
            (None, head)
        }
    };
    history.extend(prior.iter().cloned());

    Ok(Exchange {
        system,
        history,
        live: newest.content.clone(),
    })
}
