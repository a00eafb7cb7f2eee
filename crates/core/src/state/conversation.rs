//! # Conversation State
//!
//! Identity, phase, message log and consultation history of one conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::panel::phase::Phase;
use crate::specialists::SpecialistId;

/// Kind of work the conversation is scoping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Idea,
    Feature,
    Tool,
}

impl ConversationType {
    pub const ALL: [ConversationType; 3] = [
        ConversationType::Idea,
        ConversationType::Feature,
        ConversationType::Tool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Idea => "idea",
            ConversationType::Feature => "feature",
            ConversationType::Tool => "tool",
        }
    }
}

impl Default for ConversationType {
    fn default() -> Self {
        ConversationType::Idea
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idea" => Ok(ConversationType::Idea),
            "feature" => Ok(ConversationType::Feature),
            "tool" => Ok(ConversationType::Tool),
            other => Err(format!(
                "Invalid conversation type: '{}'. Expected 'idea', 'feature', or 'tool'",
                other
            )),
        }
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

/// A single entry in the conversation log. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<SpecialistId>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            agent_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn agent(agent_id: SpecialistId, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Agent,
            content: content.into(),
            agent_id: Some(agent_id),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            agent_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// A conversation being routed through the specialist panel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub conversation_type: ConversationType,
    phase: Phase,
    agent_history: Vec<SpecialistId>,
    messages: Vec<Message>,
    /// Free-form data owned by collaborators
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation with a fresh id
    pub fn new(conversation_type: ConversationType) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), conversation_type)
    }

    pub fn with_id(id: impl Into<String>, conversation_type: ConversationType) -> Self {
        Self {
            id: id.into(),
            conversation_type,
            phase: Phase::Discovery,
            agent_history: Vec::new(),
            messages: Vec::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Only the phase machine writes the phase.
    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Specialists consulted, in order. Append-only.
    pub fn agent_history(&self) -> &[SpecialistId] {
        &self.agent_history
    }

    pub(crate) fn record_consultation(&mut self, specialist: SpecialistId) {
        self.agent_history.push(specialist);
    }

    pub fn has_consulted(&self, specialist: SpecialistId) -> bool {
        self.agent_history.contains(&specialist)
    }

    /// Distinct consulted specialists in first-consulted order
    pub fn consulted(&self) -> Vec<SpecialistId> {
        let mut seen = Vec::new();
        for id in &self.agent_history {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// True until the first message or consultation is recorded
    pub fn is_pristine(&self) -> bool {
        self.messages.is_empty() && self.agent_history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_starts_in_discovery() {
        let conversation = Conversation::new(ConversationType::Tool);
        assert_eq!(conversation.phase(), Phase::Discovery);
        assert!(conversation.is_pristine());
        assert!(!conversation.id.is_empty());
    }

    #[test]
    fn test_consulted_deduplicates_in_order() {
        let mut conversation = Conversation::with_id("c-1", ConversationType::Idea);
        conversation.record_consultation(SpecialistId::ProductManager);
        conversation.record_consultation(SpecialistId::ProductManager);
        conversation.record_consultation(SpecialistId::UserResearcher);

        assert_eq!(conversation.agent_history().len(), 3);
        assert_eq!(
            conversation.consulted(),
            vec![SpecialistId::ProductManager, SpecialistId::UserResearcher]
        );
    }

    #[test]
    fn test_conversation_type_parse() {
        assert_eq!("Feature".parse::<ConversationType>(), Ok(ConversationType::Feature));
        assert!("epic".parse::<ConversationType>().is_err());
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message::agent(SpecialistId::UxDesigner, "Hello");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "agent");
        assert_eq!(json["agentId"], "ux_designer");
    }
}
