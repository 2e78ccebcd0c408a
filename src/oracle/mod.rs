//! Reasoning oracle boundary
//!
//! The agent never decides anything itself: next actions, page judgements,
//! query rewrites and the final synthesis all come from an external
//! chat-completion model reached through [`Oracle`].

pub mod openai;
pub mod reply;

pub use openai::OpenAiOracle;
pub use reply::{parse_json_reply, strip_code_fence};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Task input
    User,
    /// Model output
    Assistant,
}

/// One message of a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System instruction message
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User input message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Shape the reply should take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    Json,
}

/// An external text-completion capability
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete a conversation and return the raw reply text
    async fn complete(&self, messages: &[ChatMessage], format: ResponseFormat) -> Result<String>;
}
