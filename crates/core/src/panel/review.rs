//! # Review Gate
//!
//! The sole completion authority. Validates the latest documents against the
//! conversation type's requirement matrix and either mints an [`Approval`]
//! or hands back the questions and specialists needed for a revision.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{PanelError, PanelResult};
use crate::panel::config::PanelConfig;
use crate::specialists::{ConsistencyChecker, SpecialistId};
use crate::state::{Conversation, Document, DocumentStore, Question, QuestionKind};

/// Options offered for a missing document
pub const GENERATE_OPTION: &str = "generate";
pub const SKIP_OPTION: &str = "skip";

/// Proof that the review gate approved a conversation.
///
/// Only this module can construct one, which makes the gate the only path
/// to `completed` and to `approved` documents.
#[derive(Debug)]
pub struct Approval {
    _sealed: (),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    NeedsRevision,
}

/// Result of one review pass; the last one is retained for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub status: ReviewStatus,
    pub issues: Vec<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// A problem found with one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIssue {
    pub doc_type: String,
    pub owner: Option<SpecialistId>,
    pub message: String,
    /// Text in the document that triggered the issue, when there is one
    pub evidence: Option<String>,
}

/// Everything a review pass produces
#[derive(Debug)]
pub struct ReviewOutcome {
    pub result: ReviewResult,
    /// Validation questions for missing documents, or clarifying questions
    /// for document issues
    pub questions: Vec<Question>,
    /// Required document types that were absent
    pub missing: Vec<String>,
    /// Documents that need a new version
    pub flagged_documents: BTreeSet<String>,
    /// Specialists to re-open for routing
    pub implicated: BTreeSet<SpecialistId>,
    /// Clarifying question id -> offending text it asks about
    pub evidence: BTreeMap<String, String>,
    /// Present only when `result.status` is `Approved`
    pub approval: Option<Approval>,
}

impl ReviewOutcome {
    pub fn is_approved(&self) -> bool {
        self.approval.is_some()
    }
}

/// Validates documents and gates completion
pub struct ReviewGate<'a> {
    config: &'a PanelConfig,
    checker: &'a dyn ConsistencyChecker,
    placeholders: Option<Regex>,
}

impl<'a> ReviewGate<'a> {
    pub fn new(config: &'a PanelConfig, checker: &'a dyn ConsistencyChecker) -> Self {
        let placeholders = if config.placeholder_markers.is_empty() {
            None
        } else {
            let alternation = config
                .placeholder_markers
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                .case_insensitive(true)
                .build()
                .ok()
        };

        Self {
            config,
            checker,
            placeholders,
        }
    }

    /// Run one review pass.
    ///
    /// `waived` doc types were explicitly skipped by the user; `pass`
    /// numbers the pass so question ids stay unique across passes.
    pub fn review(
        &self,
        conversation: &Conversation,
        documents: &DocumentStore,
        waived: &BTreeSet<String>,
        pass: u32,
    ) -> ReviewOutcome {
        if let Err(PanelError::MissingRequiredDocuments { missing }) =
            self.check_required(conversation, documents, waived)
        {
            return self.missing_outcome(missing, pass);
        }

        let latest = documents.latest_all();
        let mut issues = Vec::new();
        for document in &latest {
            issues.extend(self.check_document(document));
        }
        issues.extend(self.check_consistency(&latest));

        if issues.is_empty() {
            tracing::info!(conversation_id = %conversation.id, pass, "Review approved");
            return ReviewOutcome {
                result: ReviewResult {
                    status: ReviewStatus::Approved,
                    issues: Vec::new(),
                    reviewed_at: Utc::now(),
                },
                questions: Vec::new(),
                missing: Vec::new(),
                flagged_documents: BTreeSet::new(),
                implicated: BTreeSet::new(),
                evidence: BTreeMap::new(),
                approval: Some(Approval { _sealed: () }),
            };
        }

        tracing::info!(
            conversation_id = %conversation.id,
            pass,
            issues = issues.len(),
            "Review requested revisions"
        );

        let question_id =
            |n: usize, issue: &DocumentIssue| format!("review_{}_clarify_{}_{}", pass, issue.doc_type, n + 1);
        let evidence = issues
            .iter()
            .enumerate()
            .filter_map(|(n, issue)| Some((question_id(n, issue), issue.evidence.clone()?)))
            .collect();
        let questions = issues
            .iter()
            .enumerate()
            .map(|(n, issue)| {
                let mut question = Question::new(
                    question_id(n, issue),
                    format!(
                        "The reviewer flagged the {} document: {}. How should it be addressed?",
                        issue.doc_type, issue.message
                    ),
                    QuestionKind::Clarifying,
                )
                .required();
                question.owner = issue.owner;
                question
            })
            .collect();

        ReviewOutcome {
            result: ReviewResult {
                status: ReviewStatus::NeedsRevision,
                issues: issues.iter().map(|i| format!("{}: {}", i.doc_type, i.message)).collect(),
                reviewed_at: Utc::now(),
            },
            questions,
            missing: Vec::new(),
            flagged_documents: issues.iter().map(|i| i.doc_type.clone()).collect(),
            implicated: issues.iter().filter_map(|i| i.owner).collect(),
            evidence,
            approval: None,
        }
    }

    /// Required doc types for the conversation, minus waived ones
    pub fn required_doc_types(&self, conversation: &Conversation, waived: &BTreeSet<String>) -> Vec<String> {
        self.config
            .required_doc_types(conversation.conversation_type)
            .iter()
            .filter(|doc_type| !waived.contains(*doc_type))
            .cloned()
            .collect()
    }

    fn check_required(
        &self,
        conversation: &Conversation,
        documents: &DocumentStore,
        waived: &BTreeSet<String>,
    ) -> PanelResult<()> {
        let missing: Vec<String> = self
            .required_doc_types(conversation, waived)
            .into_iter()
            .filter(|doc_type| !documents.contains(doc_type))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PanelError::MissingRequiredDocuments { missing })
        }
    }

    fn missing_outcome(&self, missing: Vec<String>, pass: u32) -> ReviewOutcome {
        tracing::info!(missing = ?missing, pass, "Review found missing documents");

        let questions = missing
            .iter()
            .map(|doc_type| {
                let mut question = Question::new(
                    format!("review_{}_missing_{}", pass, doc_type),
                    format!(
                        "The {} document has not been produced yet. Generate it now or skip it?",
                        doc_type
                    ),
                    QuestionKind::Validation,
                )
                .required()
                .with_options([GENERATE_OPTION, SKIP_OPTION]);
                question.owner = self.config.owner_of_document(doc_type);
                question
            })
            .collect();

        ReviewOutcome {
            result: ReviewResult {
                status: ReviewStatus::NeedsRevision,
                issues: missing.iter().map(|d| format!("missing: {}", d)).collect(),
                reviewed_at: Utc::now(),
            },
            questions,
            flagged_documents: BTreeSet::new(),
            implicated: BTreeSet::new(),
            evidence: BTreeMap::new(),
            missing,
            approval: None,
        }
    }

    fn check_document(&self, document: &Document) -> Vec<DocumentIssue> {
        let mut issues = Vec::new();
        let owner = self
            .config
            .owner_of_document(&document.doc_type)
            .or(Some(document.owner));

        let length = document.content.trim().chars().count();
        if length < self.config.min_document_length {
            issues.push(DocumentIssue {
                doc_type: document.doc_type.clone(),
                owner,
                message: format!(
                    "content is too short ({} of at least {} characters)",
                    length, self.config.min_document_length
                ),
                evidence: None,
            });
        }

        if let Some(marker) = self
            .placeholders
            .as_ref()
            .and_then(|re| re.find(&document.content))
        {
            issues.push(DocumentIssue {
                doc_type: document.doc_type.clone(),
                owner,
                message: format!("contains placeholder text '{}'", marker.as_str()),
                evidence: Some(marker.as_str().to_string()),
            });
        }

        issues
    }

    fn check_consistency(&self, documents: &[&Document]) -> Vec<DocumentIssue> {
        self.checker
            .check_consistency(documents)
            .into_iter()
            .map(|issue| {
                let doc_type = issue
                    .doc_types
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "documents".to_string());
                DocumentIssue {
                    owner: self.config.owner_of_document(&doc_type),
                    doc_type,
                    message: issue.message,
                    evidence: Some(format!("**{}**", issue.term)),
                }
            })
            .collect()
    }
}
