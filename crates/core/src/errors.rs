//! Typed error hierarchy for the conversation orchestration core.
//!
//! `PanelError` covers every failure the core can report back to a caller.
//! Only structural violations are fatal to an event; everything else is
//! recovered locally and surfaced as a non-fatal `error` event.

use thiserror::Error;

use crate::panel::phase::Phase;
use crate::specialists::SpecialistId;

/// Errors raised by the orchestration core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("Unknown question id '{question_id}'")]
    UnknownQuestion { question_id: String },

    #[error("Conversation {conversation_id} is completed; '{operation}' rejected")]
    TerminalState {
        conversation_id: String,
        operation: String,
    },

    #[error("Specialist {specialist} unavailable: {reason}")]
    SpecialistUnavailable {
        specialist: SpecialistId,
        reason: String,
    },

    #[error("Missing required documents: {}", .missing.join(", "))]
    MissingRequiredDocuments { missing: Vec<String> },

    #[error("Illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("Invalid panel configuration: {0}")]
    Config(String),
}

impl PanelError {
    /// Structural violations that are surfaced as user-visible failures.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TerminalState { .. } | Self::IllegalTransition { .. }
        )
    }

    /// Stable machine-readable code for transport adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownQuestion { .. } => "unknown_question",
            Self::TerminalState { .. } => "terminal_state",
            Self::SpecialistUnavailable { .. } => "specialist_unavailable",
            Self::MissingRequiredDocuments { .. } => "missing_required_documents",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Config(_) => "config",
        }
    }
}

pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let terminal = PanelError::TerminalState {
            conversation_id: "c-1".to_string(),
            operation: "user_message".to_string(),
        };
        assert!(terminal.is_fatal());

        let unknown = PanelError::UnknownQuestion {
            question_id: "nope".to_string(),
        };
        assert!(!unknown.is_fatal());
        assert_eq!(unknown.code(), "unknown_question");
    }

    #[test]
    fn test_missing_documents_message() {
        let err = PanelError::MissingRequiredDocuments {
            missing: vec!["prd".to_string(), "persona".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required documents: prd, persona");
    }
}
