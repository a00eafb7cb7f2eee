//! # Conversation Context
//!
//! Aggregate root for one conversation: the conversation itself, its
//! question ledger, its documents, and the routing bookkeeping that is not
//! part of the audit log (re-opened specialists, waived documents, notes).

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{PanelError, PanelResult};
use crate::models::ModelConfig;
use crate::panel::config::PanelConfig;
use crate::panel::phase::PhaseInputs;
use crate::panel::review::ReviewResult;
use crate::panel::router::RoutingInputs;
use crate::specialists::{AnsweredQuestion, SpecialistContext, SpecialistId};
use crate::state::{
    Conversation, ConversationSnapshot, ConversationType, DocumentStore, QuestionLedger,
};

/// All mutable state for one conversation id
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub conversation: Conversation,
    pub ledger: QuestionLedger,
    pub documents: DocumentStore,
    pub last_review: Option<ReviewResult>,
    pub model: Option<ModelConfig>,
    /// Specialists re-opened by review, with the issues raised against them
    pub(crate) reactivated: BTreeMap<SpecialistId, Vec<String>>,
    /// Required doc types the user chose to skip
    pub(crate) waived_documents: BTreeSet<String>,
    pub(crate) transition_declined: bool,
    /// The discovery → definition prompt has been shown
    pub(crate) transition_offered: bool,
    /// Validation question id -> missing doc type it asks about
    pub(crate) pending_validations: BTreeMap<String, String>,
    /// Clarifying question id -> answered question whose text it replaces
    pub(crate) pending_clarifications: BTreeMap<String, String>,
    pub(crate) review_passes: u32,
    /// Question ids already sent to the client
    pub(crate) surfaced: BTreeSet<String>,
    /// User messages that answered no question
    pub(crate) notes: Vec<String>,
}

impl ConversationContext {
    pub fn new(conversation_type: ConversationType) -> Self {
        Self::from_conversation(Conversation::new(conversation_type))
    }

    pub fn with_id(id: impl Into<String>, conversation_type: ConversationType) -> Self {
        Self::from_conversation(Conversation::with_id(id, conversation_type))
    }

    fn from_conversation(conversation: Conversation) -> Self {
        Self {
            conversation,
            ledger: QuestionLedger::new(),
            documents: DocumentStore::new(),
            last_review: None,
            model: None,
            reactivated: BTreeMap::new(),
            waived_documents: BTreeSet::new(),
            transition_declined: false,
            transition_offered: false,
            pending_validations: BTreeMap::new(),
            pending_clarifications: BTreeMap::new(),
            review_passes: 0,
            surfaced: BTreeSet::new(),
            notes: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    /// Reject mutation of a completed conversation
    pub fn ensure_mutable(&self, operation: &str) -> PanelResult<()> {
        if self.conversation.phase().is_terminal() {
            return Err(PanelError::TerminalState {
                conversation_id: self.conversation.id.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub fn reactivated(&self) -> BTreeSet<SpecialistId> {
        self.reactivated.keys().copied().collect()
    }

    pub fn waived_documents(&self) -> &BTreeSet<String> {
        &self.waived_documents
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn review_passes(&self) -> u32 {
        self.review_passes
    }

    pub fn transition_declined(&self) -> bool {
        self.transition_declined
    }

    /// First answered question whose text contains `evidence`
    /// (case-insensitive), preferring questions addressed to `owner`
    pub(crate) fn answer_containing(&self, evidence: &str, owner: Option<SpecialistId>) -> Option<String> {
        let needle = evidence.to_lowercase();
        let matching: Vec<&str> = self
            .ledger
            .answered()
            .filter(|(_, response)| response.answer_text.to_lowercase().contains(&needle))
            .map(|(question, _)| question.id.as_str())
            .collect();

        let owned = matching
            .iter()
            .find(|id| owner.is_some() && self.ledger.question(id).and_then(|q| q.owner) == owner);
        owned.or(matching.first()).map(|id| id.to_string())
    }

    pub fn phase_inputs<'a>(&'a self, config: &'a PanelConfig) -> PhaseInputs<'a> {
        PhaseInputs {
            conversation: &self.conversation,
            ledger: &self.ledger,
            config,
            transition_declined: self.transition_declined,
            revisions_outstanding: !self.reactivated.is_empty(),
        }
    }

    pub fn routing_inputs<'a>(
        &'a self,
        reactivated: &'a BTreeSet<SpecialistId>,
        skipped: &'a BTreeSet<SpecialistId>,
    ) -> RoutingInputs<'a> {
        RoutingInputs {
            conversation_type: self.conversation.conversation_type,
            phase: self.conversation.phase(),
            agent_history: self.conversation.agent_history(),
            reactivated,
            skipped,
        }
    }

    /// Owned view handed to a specialist call
    pub fn specialist_context(&self, specialist: SpecialistId, config: &PanelConfig) -> SpecialistContext {
        let answers = self
            .ledger
            .answered()
            .map(|(question, response)| AnsweredQuestion {
                question_id: question.id.clone(),
                question: question.content.clone(),
                answer: response.answer_text.clone(),
                owner: question.owner,
            })
            .collect();

        let previous_version = config
            .documents_owned_by(specialist)
            .iter()
            .filter_map(|doc_type| self.documents.latest(doc_type))
            .map(|doc| doc.version)
            .max();

        SpecialistContext {
            conversation_id: self.conversation.id.clone(),
            conversation_type: self.conversation.conversation_type,
            phase: self.conversation.phase(),
            model: self.model.clone(),
            issued_ids: self.ledger.issued_ids().into_iter().map(String::from).collect(),
            answers,
            required_ids: config.required_questions_for(specialist).to_vec(),
            notes: self.notes.clone(),
            revision_notes: self.reactivated.get(&specialist).cloned().unwrap_or_default(),
            previous_version,
        }
    }

    /// Archive-ready copy of the current state
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation: self.conversation.clone(),
            questions: self.ledger.questions().to_vec(),
            responses: self.ledger.responses(),
            documents: self.documents.all_versions(),
            last_review: self.last_review.clone(),
            archived_at: Utc::now(),
        }
    }
}
