//! # Specialists
//!
//! The panel of document-generation collaborators the router dispatches to.
//!
//! ## Architecture
//!
//! ```text
//! SpecialistRegistry (ordered catalog)
//!   └── Arc<dyn Specialist> per SpecialistId
//!         ├── generate_questions(context)
//!         ├── has_enough_info(context)
//!         └── generate_document(context, doc_type)
//! ```
//!
//! The core only ever calls these three operations. Prompting, templates
//! and prose generation live behind the trait.

pub mod consistency;
pub mod question_bank;
pub mod registry;
pub mod template;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::models::ModelConfig;
use crate::panel::phase::Phase;
use crate::panel::trigger::DocumentTrigger;
use crate::state::{ConversationType, Document, Question};

pub use consistency::{ConsistencyChecker, ConsistencyIssue, GlossaryConsistencyChecker};
pub use registry::SpecialistRegistry;
pub use template::TemplateSpecialist;

/// Closed set of specialists known to the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistId {
    ProductManager,
    UxDesigner,
    DatabaseArchitect,
    SoftwareEngineer,
    UserResearcher,
    BusinessAnalyst,
    SolutionArchitect,
}

impl SpecialistId {
    /// Catalog order
    pub const ALL: [SpecialistId; 7] = [
        SpecialistId::ProductManager,
        SpecialistId::UxDesigner,
        SpecialistId::DatabaseArchitect,
        SpecialistId::SoftwareEngineer,
        SpecialistId::UserResearcher,
        SpecialistId::BusinessAnalyst,
        SpecialistId::SolutionArchitect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistId::ProductManager => "product_manager",
            SpecialistId::UxDesigner => "ux_designer",
            SpecialistId::DatabaseArchitect => "database_architect",
            SpecialistId::SoftwareEngineer => "software_engineer",
            SpecialistId::UserResearcher => "user_researcher",
            SpecialistId::BusinessAnalyst => "business_analyst",
            SpecialistId::SolutionArchitect => "solution_architect",
        }
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            SpecialistId::ProductManager => "Product Manager",
            SpecialistId::UxDesigner => "UX Designer",
            SpecialistId::DatabaseArchitect => "Database Architect",
            SpecialistId::SoftwareEngineer => "Software Engineer",
            SpecialistId::UserResearcher => "User Researcher",
            SpecialistId::BusinessAnalyst => "Business Analyst",
            SpecialistId::SolutionArchitect => "Solution Architect",
        }
    }
}

impl fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecialistId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown specialist: '{}'", s))
    }
}

/// An answered question as seen by a specialist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    /// Specialist the question was addressed to, if any
    pub owner: Option<SpecialistId>,
}

/// Read-only view of a conversation handed to a specialist.
///
/// Owned rather than borrowed so a specialist call can be awaited without
/// holding a reference into the conversation state.
#[derive(Debug, Clone)]
pub struct SpecialistContext {
    pub conversation_id: String,
    pub conversation_type: ConversationType,
    pub phase: Phase,
    pub model: Option<ModelConfig>,
    /// Every question id issued so far, answered or not
    pub issued_ids: BTreeSet<String>,
    /// All answers recorded so far, in issue order
    pub answers: Vec<AnsweredQuestion>,
    /// Required question ids configured for the specialist being called
    pub required_ids: Vec<String>,
    /// Free-form user messages that did not answer a question
    pub notes: Vec<String>,
    /// Review issues raised against this specialist's documents
    pub revision_notes: Vec<String>,
    /// Latest version of the document being regenerated, if any
    pub previous_version: Option<u32>,
}

impl SpecialistContext {
    /// Ids of all answered questions
    pub fn answered_ids(&self) -> BTreeSet<&str> {
        self.answers.iter().map(|a| a.question_id.as_str()).collect()
    }

    /// Answers to questions addressed to `specialist`
    pub fn answers_for(&self, specialist: SpecialistId) -> impl Iterator<Item = &AnsweredQuestion> {
        self.answers
            .iter()
            .filter(move |a| a.owner == Some(specialist))
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .map(|a| a.answer.as_str())
    }
}

/// Capability contract every specialist implements
#[async_trait]
pub trait Specialist: Send + Sync {
    fn id(&self) -> SpecialistId;

    /// Questions to ask next. Ids already in `context.issued_ids` are
    /// ignored by the ledger, so returning them again is harmless.
    async fn generate_questions(&self, context: &SpecialistContext) -> anyhow::Result<Vec<Question>>;

    /// Whether enough is known to generate a document.
    fn has_enough_info(&self, context: &SpecialistContext) -> bool {
        let answered = context.answered_ids();
        DocumentTrigger::covers(&answered, &context.required_ids)
    }

    /// Produce a document of `doc_type`. Version and status are assigned
    /// by the document store, not by the specialist.
    async fn generate_document(
        &self,
        context: &SpecialistContext,
        doc_type: &str,
    ) -> anyhow::Result<Document>;
}
