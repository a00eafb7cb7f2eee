//! # Question/Answer Ledger
//!
//! Records which questions were issued in a conversation and which have been
//! answered. Knows nothing about documents: it tracks id membership and text.
//!
//! Invariant: every issued id is either answered or pending, never both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::errors::{PanelError, PanelResult};
use crate::specialists::SpecialistId;

/// How a question came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Fixed question from a specialist's bank
    Template,
    /// Generated from earlier answers
    Dynamic,
    /// Raised by the review gate about a missing document
    Validation,
    /// Raised by the review gate about an issue in a document
    Clarifying,
}

/// A question posed to the user. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub content: String,
    pub required: bool,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Specialist the question is addressed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<SpecialistId>,
}

impl Question {
    pub fn new(id: impl Into<String>, content: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            required: false,
            kind,
            options: None,
            owner: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn owned_by(mut self, owner: SpecialistId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

/// The user's answer to a question. Last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question_id: String,
    pub answer_text: String,
    pub answered_at: DateTime<Utc>,
}

/// Per-conversation ledger of issued questions and their answers
#[derive(Debug, Clone, Default)]
pub struct QuestionLedger {
    issued: Vec<Question>,
    index: HashMap<String, usize>,
    responses: HashMap<String, QuestionResponse>,
}

impl QuestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a question was posed. Returns `false` if the id was
    /// already issued; the original question is kept unchanged.
    pub fn record_issued(&mut self, question: Question) -> bool {
        if self.index.contains_key(&question.id) {
            return false;
        }
        self.index.insert(question.id.clone(), self.issued.len());
        self.issued.push(question);
        true
    }

    /// Record an answer. Re-answering overwrites the stored text.
    pub fn record_answer(
        &mut self,
        question_id: &str,
        answer_text: impl Into<String>,
    ) -> PanelResult<&QuestionResponse> {
        if !self.index.contains_key(question_id) {
            return Err(PanelError::UnknownQuestion {
                question_id: question_id.to_string(),
            });
        }

        let response = QuestionResponse {
            question_id: question_id.to_string(),
            answer_text: answer_text.into(),
            answered_at: Utc::now(),
        };
        self.responses.insert(question_id.to_string(), response);

        Ok(&self.responses[question_id])
    }

    pub fn is_issued(&self, question_id: &str) -> bool {
        self.index.contains_key(question_id)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.responses.contains_key(question_id)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.index.get(question_id).map(|&i| &self.issued[i])
    }

    pub fn response(&self, question_id: &str) -> Option<&QuestionResponse> {
        self.responses.get(question_id)
    }

    pub fn issued_ids(&self) -> BTreeSet<&str> {
        self.issued.iter().map(|q| q.id.as_str()).collect()
    }

    pub fn answered_ids(&self) -> BTreeSet<&str> {
        self.responses.keys().map(String::as_str).collect()
    }

    pub fn pending_ids(&self) -> BTreeSet<&str> {
        self.pending().map(|q| q.id.as_str()).collect()
    }

    /// Unanswered questions in the order they were issued
    pub fn pending(&self) -> impl Iterator<Item = &Question> {
        self.issued
            .iter()
            .filter(move |q| !self.responses.contains_key(&q.id))
    }

    /// Oldest unanswered question
    pub fn next_pending(&self) -> Option<&Question> {
        self.pending().next()
    }

    pub fn has_pending(&self) -> bool {
        self.next_pending().is_some()
    }

    /// Whether `specialist` still has questions waiting on the user
    pub fn has_pending_for(&self, specialist: SpecialistId) -> bool {
        self.pending().any(|q| q.owner == Some(specialist))
    }

    pub fn answered_count(&self) -> usize {
        self.responses.len()
    }

    /// Number of answered questions marked required for `specialist`
    pub fn required_answered_count(&self, specialist: SpecialistId) -> usize {
        self.issued
            .iter()
            .filter(|q| q.owner == Some(specialist) && q.required)
            .filter(|q| self.responses.contains_key(&q.id))
            .count()
    }

    /// Answered questions with their responses, in issue order
    pub fn answered(&self) -> impl Iterator<Item = (&Question, &QuestionResponse)> {
        self.issued
            .iter()
            .filter_map(move |q| self.responses.get(&q.id).map(|r| (q, r)))
    }

    /// All issued questions in issue order
    pub fn questions(&self) -> &[Question] {
        &self.issued
    }

    /// All responses in issue order
    pub fn responses(&self) -> Vec<QuestionResponse> {
        self.answered().map(|(_, r)| r.clone()).collect()
    }
}
