//! # Document Trigger
//!
//! Decides, per specialist, whether enough answers exist to request document
//! generation. Only the configured required question ids gate generation;
//! optional questions never block it.

use std::collections::BTreeSet;

use crate::panel::config::PanelConfig;
use crate::specialists::SpecialistId;
use crate::state::{DocumentStore, QuestionLedger};

/// What the orchestrator should do about a specialist's documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Required answers still outstanding
    NotReady { missing: Vec<String> },
    /// Generate (or regenerate) these document types
    Generate { doc_types: Vec<String> },
    /// Every owned document exists and nothing asked for a regeneration
    UpToDate,
}

pub struct DocumentTrigger;

impl DocumentTrigger {
    /// True iff every required id has been answered
    pub fn has_enough_info(ledger: &QuestionLedger, required_ids: &[String]) -> bool {
        Self::covers(&ledger.answered_ids(), required_ids)
    }

    /// True iff `answered` contains every id in `required_ids`
    pub fn covers(answered: &BTreeSet<&str>, required_ids: &[String]) -> bool {
        required_ids.iter().all(|id| answered.contains(id.as_str()))
    }

    /// Required ids not yet answered, in configured order
    pub fn missing(ledger: &QuestionLedger, required_ids: &[String]) -> Vec<String> {
        required_ids
            .iter()
            .filter(|id| !ledger.is_answered(id))
            .cloned()
            .collect()
    }

    /// Evaluate one specialist.
    ///
    /// `regenerate` asks for a new version of every owned document (used for
    /// revision); otherwise only owned types with no version yet are
    /// generated. `waived` types are never generated.
    pub fn evaluate(
        config: &PanelConfig,
        ledger: &QuestionLedger,
        documents: &DocumentStore,
        specialist: SpecialistId,
        waived: &BTreeSet<String>,
        regenerate: bool,
    ) -> TriggerDecision {
        let missing = Self::missing(ledger, config.required_questions_for(specialist));
        if !missing.is_empty() {
            return TriggerDecision::NotReady { missing };
        }

        let doc_types: Vec<String> = config
            .documents_owned_by(specialist)
            .into_iter()
            .filter(|doc_type| !waived.contains(doc_type))
            .filter(|doc_type| regenerate || !documents.contains(doc_type))
            .collect();

        if doc_types.is_empty() {
            TriggerDecision::UpToDate
        } else {
            TriggerDecision::Generate { doc_types }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Document, Question, QuestionKind};

    const RESEARCH_IDS: [&str; 4] = [
        "research_audience",
        "research_pain_points",
        "research_goals",
        "research_context",
    ];

    fn issue_research(ledger: &mut QuestionLedger) {
        for id in RESEARCH_IDS {
            ledger.record_issued(
                Question::new(id, id, QuestionKind::Template)
                    .required()
                    .owned_by(SpecialistId::UserResearcher),
            );
        }
    }

    #[test]
    fn test_not_ready_until_all_required_answered() {
        let config = PanelConfig::default();
        let mut ledger = QuestionLedger::new();
        issue_research(&mut ledger);
        ledger.record_answer("research_audience", "indie devs").unwrap();

        let required = config.required_questions_for(SpecialistId::UserResearcher);
        assert!(!DocumentTrigger::has_enough_info(&ledger, required));

        let decision = DocumentTrigger::evaluate(
            &config,
            &ledger,
            &DocumentStore::new(),
            SpecialistId::UserResearcher,
            &BTreeSet::new(),
            false,
        );
        assert_eq!(
            decision,
            TriggerDecision::NotReady {
                missing: vec![
                    "research_pain_points".to_string(),
                    "research_goals".to_string(),
                    "research_context".to_string(),
                ]
            }
        );
    }

    #[test]
    fn test_optional_questions_never_block() {
        let config = PanelConfig::default();
        let mut ledger = QuestionLedger::new();
        issue_research(&mut ledger);
        ledger.record_issued(
            Question::new("research_competitors", "?", QuestionKind::Template)
                .owned_by(SpecialistId::UserResearcher),
        );
        for id in RESEARCH_IDS {
            ledger.record_answer(id, "answer").unwrap();
        }

        let decision = DocumentTrigger::evaluate(
            &config,
            &ledger,
            &DocumentStore::new(),
            SpecialistId::UserResearcher,
            &BTreeSet::new(),
            false,
        );
        assert_eq!(
            decision,
            TriggerDecision::Generate {
                doc_types: vec!["persona".to_string()]
            }
        );
    }

    #[test]
    fn test_existing_document_is_up_to_date_unless_regenerating() {
        let config = PanelConfig::default();
        let mut ledger = QuestionLedger::new();
        issue_research(&mut ledger);
        for id in RESEARCH_IDS {
            ledger.record_answer(id, "answer").unwrap();
        }
        let mut documents = DocumentStore::new();
        documents.record(Document::draft(SpecialistId::UserResearcher, "persona", "x"));

        let evaluate = |regenerate| {
            DocumentTrigger::evaluate(
                &config,
                &ledger,
                &documents,
                SpecialistId::UserResearcher,
                &BTreeSet::new(),
                regenerate,
            )
        };
        assert_eq!(evaluate(false), TriggerDecision::UpToDate);
        assert!(matches!(evaluate(true), TriggerDecision::Generate { .. }));
    }

    #[test]
    fn test_waived_documents_are_skipped() {
        let config = PanelConfig::default();
        let mut ledger = QuestionLedger::new();
        issue_research(&mut ledger);
        for id in RESEARCH_IDS {
            ledger.record_answer(id, "answer").unwrap();
        }
        let waived = BTreeSet::from(["persona".to_string()]);

        let decision = DocumentTrigger::evaluate(
            &config,
            &ledger,
            &DocumentStore::new(),
            SpecialistId::UserResearcher,
            &waived,
            false,
        );
        assert_eq!(decision, TriggerDecision::UpToDate);
    }
}
