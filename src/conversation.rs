use crate::error::ChatError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ChatError::InvalidRole(other.to_string())),
        }
    }
}

/// One turn of the conversation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Wire shape shared by every backend: `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Ordered message log plus an optional system prompt.
///
/// The protocol layer only ever borrows this; appending turns is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: Some(system_prompt.into()),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Drop every turn; the system prompt stays.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn to_api_messages(&self) -> Vec<ApiMessage> {
        self.messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role().as_str().to_string(),
                content: m.content().to_string(),
            })
            .collect()
    }

    /// API messages with the system prompt, if any, as a leading "system" turn.
    pub fn to_api_messages_with_system(&self) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system_prompt {
            out.push(ApiMessage::system(system.clone()));
        }
        out.extend(self.to_api_messages());
        out
    }
}
