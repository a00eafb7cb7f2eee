//! # Panel Events
//!
//! Semantic events consumed and produced by a conversation session.
//! Serialized with a `type` tag; a transport adapter owns the wire framing.

use serde::{Deserialize, Serialize};

use crate::panel::phase::Phase;
use crate::panel::review::ReviewResult;
use crate::specialists::SpecialistId;
use crate::state::{ConversationType, Document, DocumentStatus, Question};

/// Events coming from the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    #[serde(rename_all = "camelCase")]
    StartConversation {
        conversation_type: ConversationType,
        #[serde(default)]
        selected_model: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UserMessage {
        content: String,
        /// Question being answered; defaults to the oldest pending one
        #[serde(default)]
        question_id: Option<String>,
    },
    Typing,
    Heartbeat,
    /// Go ahead with discovery → definition
    AcceptTransition,
    /// Stay in discovery for now
    DeclineTransition,
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartConversation { .. } => "start_conversation",
            Self::UserMessage { .. } => "user_message",
            Self::Typing => "typing",
            Self::Heartbeat => "heartbeat",
            Self::AcceptTransition => "accept_transition",
            Self::DeclineTransition => "decline_transition",
        }
    }

    pub fn user_message(content: impl Into<String>) -> Self {
        Self::UserMessage {
            content: content.into(),
            question_id: None,
        }
    }

    pub fn answer(question_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::UserMessage {
            content: content.into(),
            question_id: Some(question_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStatus {
    Thinking,
    Done,
}

/// Compact document listing for `documents_ready`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_type: String,
    pub version: u32,
    pub status: DocumentStatus,
    pub owner: SpecialistId,
    pub content: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            document_type: doc.doc_type.clone(),
            version: doc.version,
            status: doc.status,
            owner: doc.owner,
            content: doc.content.clone(),
        }
    }
}

/// Events going to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    #[serde(rename_all = "camelCase")]
    AgentMessage {
        agent_id: Option<SpecialistId>,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    AgentQuestion {
        agent_id: Option<SpecialistId>,
        question: Question,
    },
    #[serde(rename_all = "camelCase")]
    AgentThinking {
        agent_id: SpecialistId,
        status: ThinkingStatus,
    },
    #[serde(rename_all = "camelCase")]
    DocumentUpdate {
        document_type: String,
        content: String,
        version: u32,
        status: DocumentStatus,
    },
    #[serde(rename_all = "camelCase")]
    GeneratingDocuments { agent_id: SpecialistId },
    DocumentsReady { documents: Vec<DocumentSummary> },
    PhaseChanged { from: Phase, to: Phase },
    #[serde(rename = "review_result")]
    ReviewCompleted { result: ReviewResult },
    /// Message accepted; `queued` when it answered nothing and was kept
    /// for the next routing decision
    Ack { received: String, queued: bool },
    Error {
        error: String,
        code: String,
        fatal: bool,
    },
}

impl PanelEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentMessage { .. } => "agent_message",
            Self::AgentQuestion { .. } => "agent_question",
            Self::AgentThinking { .. } => "agent_thinking",
            Self::DocumentUpdate { .. } => "document_update",
            Self::GeneratingDocuments { .. } => "generating_documents",
            Self::DocumentsReady { .. } => "documents_ready",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::ReviewCompleted { .. } => "review_result",
            Self::Ack { .. } => "ack",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(err: &crate::errors::PanelError) -> Self {
        Self::Error {
            error: err.to_string(),
            code: err.code().to_string(),
            fatal: err.is_fatal(),
        }
    }
}
