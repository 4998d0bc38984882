use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{unix_epoch_millis, ImageRef};

pub const GREETING: &str = "Hi! I'm your AI Thumbnail Pro. Upload an image or describe a scene, and I'll create a high-impact 16:9 YouTube thumbnail for you. What are we making today?";
pub const FRESH_START_GREETING: &str = "Let's start fresh. What's your new video about?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub timestamp: i64,
}

/// Append-only chat transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(text: &str) -> Self {
        let mut log = Self::new();
        log.push_assistant(text, None);
        log
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        self.turns.as_slice()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ConversationTurn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User && !turn.text.trim().is_empty())
            .map(|turn| turn.text.as_str())
    }

    pub fn push_user(&mut self, text: &str) -> &ConversationTurn {
        self.push(Role::User, text, None)
    }

    pub fn push_assistant(&mut self, text: &str, image: Option<ImageRef>) -> &ConversationTurn {
        self.push(Role::Assistant, text, image)
    }

    fn push(&mut self, role: Role, text: &str, image: Option<ImageRef>) -> &ConversationTurn {
        self.turns.push(ConversationTurn {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.to_string(),
            image,
            timestamp: unix_epoch_millis(),
        });
        &self.turns[self.turns.len() - 1]
    }
}
