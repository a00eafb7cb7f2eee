//! # Document Store
//!
//! Versioned requirement documents produced by specialists. Regeneration
//! appends a new version; nothing is ever deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::panel::review::Approval;
use crate::specialists::SpecialistId;

/// Lifecycle status of a document version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Generated,
    Approved,
    NeedsRevision,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Approved => "approved",
            Self::NeedsRevision => "needs_revision",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "generated" => Ok(Self::Generated),
            "approved" => Ok(Self::Approved),
            "needs_revision" => Ok(Self::NeedsRevision),
            other => Err(format!("Unknown document status: '{}'", other)),
        }
    }
}

/// One version of a requirement document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub doc_type: String,
    pub content: String,
    pub version: u32,
    pub status: DocumentStatus,
    pub owner: SpecialistId,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// A draft; the store assigns the real version when it is recorded.
    pub fn draft(owner: SpecialistId, doc_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            content: content.into(),
            version: 0,
            status: DocumentStatus::Draft,
            owner,
            created_at: Utc::now(),
        }
    }
}

/// All document versions for one conversation, keyed by doc type
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    versions: BTreeMap<String, Vec<Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a generated document as the next version of its type.
    pub fn record(&mut self, mut document: Document) -> &Document {
        let history = self.versions.entry(document.doc_type.clone()).or_default();
        document.version = history.last().map(|d| d.version + 1).unwrap_or(1);
        if document.status == DocumentStatus::Draft || document.status == DocumentStatus::Approved {
            document.status = DocumentStatus::Generated;
        }
        let index = history.len();
        history.push(document);
        &history[index]
    }

    pub fn latest(&self, doc_type: &str) -> Option<&Document> {
        self.versions.get(doc_type).and_then(|h| h.last())
    }

    pub fn contains(&self, doc_type: &str) -> bool {
        self.versions.contains_key(doc_type)
    }

    /// Latest version of every document, ordered by doc type
    pub fn latest_all(&self) -> Vec<&Document> {
        self.versions.values().filter_map(|h| h.last()).collect()
    }

    pub fn doc_types(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }

    pub fn history(&self, doc_type: &str) -> &[Document] {
        self.versions.get(doc_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every version of every document
    pub fn all_versions(&self) -> Vec<Document> {
        self.versions.values().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub(crate) fn mark_needs_revision(&mut self, doc_type: &str) {
        if let Some(doc) = self.versions.get_mut(doc_type).and_then(|h| h.last_mut()) {
            doc.status = DocumentStatus::NeedsRevision;
        }
    }

    /// Approve the latest version of every document. Requires the token
    /// only the review gate can mint.
    pub fn approve_all(&mut self, _approval: &Approval) {
        for doc in self.versions.values_mut().filter_map(|h| h.last_mut()) {
            doc.status = DocumentStatus::Approved;
        }
    }
}
