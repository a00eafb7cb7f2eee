//! # Consistency Checking
//!
//! Cross-document check used by the review gate. The default checker
//! compares glossary-style definitions (`**Term**: definition`) across
//! documents and flags terms that two documents define differently.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::Document;

/// A divergence between two documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub term: String,
    /// Doc types involved, first-defining document first
    pub doc_types: Vec<String>,
    pub message: String,
}

/// External consistency collaborator consulted during review
pub trait ConsistencyChecker: Send + Sync {
    fn check_consistency(&self, documents: &[&Document]) -> Vec<ConsistencyIssue>;
}

/// Flags terms defined differently in two documents
pub struct GlossaryConsistencyChecker {
    pattern: Option<Regex>,
}

impl Default for GlossaryConsistencyChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl GlossaryConsistencyChecker {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?m)^\s*(?:[-*]\s+)?\*\*(?P<term>[^*\n]+)\*\*\s*:\s*(?P<def>.+?)\s*$").ok(),
        }
    }

    fn definitions<'d>(&self, document: &'d Document) -> Vec<(String, &'d str)> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(&document.content)
            .filter_map(|caps| {
                let term = caps.name("term")?.as_str().trim().to_lowercase();
                let def = caps.name("def")?.as_str();
                Some((term, def))
            })
            .collect()
    }
}

fn normalize(definition: &str) -> String {
    definition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_lowercase()
}

impl ConsistencyChecker for GlossaryConsistencyChecker {
    fn check_consistency(&self, documents: &[&Document]) -> Vec<ConsistencyIssue> {
        // term -> (doc_type, normalized definition) of its first definition
        let mut first_seen: BTreeMap<String, (String, String)> = BTreeMap::new();
        let mut issues = Vec::new();

        for document in documents {
            for (term, definition) in self.definitions(document) {
                let normalized = normalize(definition);
                match first_seen.get(&term) {
                    None => {
                        first_seen.insert(term, (document.doc_type.clone(), normalized));
                    }
                    Some((doc_type, existing)) if doc_type != &document.doc_type && existing != &normalized => {
                        issues.push(ConsistencyIssue {
                            message: format!(
                                "'{}' is defined differently in {} and {}",
                                term, doc_type, document.doc_type
                            ),
                            doc_types: vec![doc_type.clone(), document.doc_type.clone()],
                            term,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        issues
    }
}
