//! # Template Specialist
//!
//! Deterministic specialist backed by the question bank. Asks its required
//! questions plus a few optional follow-ups, and renders answers into a
//! Markdown document. Used as the default panel and in tests; model-backed
//! specialists plug in through the same trait.

use async_trait::async_trait;
use std::fmt::Write as _;

use super::question_bank::{self, BankEntry};
use super::{Specialist, SpecialistContext, SpecialistId};
use crate::state::{Document, Question, QuestionKind};

pub struct TemplateSpecialist {
    id: SpecialistId,
    optional_per_turn: usize,
}

impl TemplateSpecialist {
    pub fn new(id: SpecialistId, optional_per_turn: usize) -> Self {
        Self {
            id,
            optional_per_turn,
        }
    }

    fn bank_question(&self, entry: &BankEntry, required: bool) -> Question {
        let mut question = Question::new(entry.id, entry.content, QuestionKind::Template).owned_by(self.id);
        if required {
            question = question.required();
        }
        if !entry.options.is_empty() {
            question = question.with_options(entry.options.iter().copied());
        }
        question
    }
}

/// Human title for a document type
pub fn document_title(doc_type: &str) -> String {
    match doc_type {
        "prd" => "Product Requirements".to_string(),
        "design_spec" => "Design Specification".to_string(),
        "data_model" => "Data Model".to_string(),
        "tech_spec" => "Technical Specification".to_string(),
        "persona" => "User Personas".to_string(),
        "business_case" => "Business Case".to_string(),
        "architecture" => "Solution Architecture".to_string(),
        other => other
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[async_trait]
impl Specialist for TemplateSpecialist {
    fn id(&self) -> SpecialistId {
        self.id
    }

    async fn generate_questions(&self, context: &SpecialistContext) -> anyhow::Result<Vec<Question>> {
        let is_new = |id: &str| !context.issued_ids.contains(id);

        // required ids come from config and may name questions outside the bank
        let mut questions: Vec<Question> = context
            .required_ids
            .iter()
            .filter(|id| is_new(id))
            .map(|id| match question_bank::find(id) {
                Some(entry) => self.bank_question(entry, true),
                None => Question::new(
                    id.clone(),
                    format!("{}: tell me about {}.", self.id.display_name(), id.replace('_', " ")),
                    QuestionKind::Dynamic,
                )
                .required()
                .owned_by(self.id),
            })
            .collect();

        questions.extend(
            question_bank::for_specialist(self.id)
                .filter(|e| is_new(e.id) && !context.required_ids.iter().any(|r| r == e.id))
                .take(self.optional_per_turn)
                .map(|e| self.bank_question(e, false)),
        );

        Ok(questions)
    }

    async fn generate_document(&self, context: &SpecialistContext, doc_type: &str) -> anyhow::Result<Document> {
        let mut out = String::new();
        writeln!(out, "# {}", document_title(doc_type))?;
        writeln!(out)?;
        writeln!(
            out,
            "Prepared by the {} for this {} conversation.",
            self.id.display_name(),
            context.conversation_type
        )?;

        let mut clarifications = Vec::new();
        for answer in context.answers_for(self.id) {
            if question_bank::find(&answer.question_id).is_some()
                || context.required_ids.contains(&answer.question_id)
            {
                writeln!(out)?;
                writeln!(out, "## {}", answer.question)?;
                writeln!(out)?;
                writeln!(out, "{}", answer.answer.trim())?;
            } else {
                clarifications.push(answer.answer.trim());
            }
        }

        if !clarifications.is_empty() {
            writeln!(out)?;
            writeln!(out, "## Clarifications")?;
            writeln!(out)?;
            for text in clarifications {
                writeln!(out, "- {}", text)?;
            }
        }

        if !context.notes.is_empty() {
            writeln!(out)?;
            writeln!(out, "## Additional Notes")?;
            writeln!(out)?;
            for note in &context.notes {
                writeln!(out, "- {}", note.trim())?;
            }
        }

        if let Some(previous) = context.previous_version {
            writeln!(out)?;
            writeln!(
                out,
                "_Revision of version {} addressing {} review finding(s)._",
                previous,
                context.revision_notes.len()
            )?;
        }

        Ok(Document::draft(self.id, doc_type, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::config::PanelConfig;
    use crate::panel::phase::Phase;
    use crate::specialists::AnsweredQuestion;
    use crate::state::ConversationType;
    use std::collections::BTreeSet;

    fn context(specialist: SpecialistId) -> SpecialistContext {
        SpecialistContext {
            conversation_id: "c-1".to_string(),
            conversation_type: ConversationType::Tool,
            phase: Phase::Discovery,
            model: None,
            issued_ids: BTreeSet::new(),
            answers: Vec::new(),
            required_ids: PanelConfig::default().required_questions_for(specialist).to_vec(),
            notes: Vec::new(),
            revision_notes: Vec::new(),
            previous_version: None,
        }
    }

    #[tokio::test]
    async fn test_first_turn_asks_required_then_optional() {
        let specialist = TemplateSpecialist::new(SpecialistId::DatabaseArchitect, 2);
        let questions = specialist
            .generate_questions(&context(SpecialistId::DatabaseArchitect))
            .await
            .unwrap();

        let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["data_entities", "data_relationships", "data_storage", "data_retention"]
        );
        assert!(questions[..3].iter().all(|q| q.required));
        assert!(!questions[3].required);
        assert!(questions.iter().all(|q| q.owner == Some(SpecialistId::DatabaseArchitect)));
        assert_eq!(questions[2].options.as_ref().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn test_issued_questions_are_not_repeated() {
        let specialist = TemplateSpecialist::new(SpecialistId::DatabaseArchitect, 2);
        let mut ctx = context(SpecialistId::DatabaseArchitect);
        for e in question_bank::for_specialist(SpecialistId::DatabaseArchitect) {
            ctx.issued_ids.insert(e.id.to_string());
        }
        assert!(specialist.generate_questions(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_required_id_gets_a_dynamic_question() {
        let specialist = TemplateSpecialist::new(SpecialistId::SoftwareEngineer, 0);
        let mut ctx = context(SpecialistId::SoftwareEngineer);
        ctx.required_ids = vec!["eng_observability".to_string()];

        let questions = specialist.generate_questions(&ctx).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].kind, QuestionKind::Dynamic);
        assert!(questions[0].required);
    }

    #[tokio::test]
    async fn test_document_renders_owned_answers() {
        let specialist = TemplateSpecialist::new(SpecialistId::DatabaseArchitect, 2);
        let mut ctx = context(SpecialistId::DatabaseArchitect);
        ctx.answers = vec![
            AnsweredQuestion {
                question_id: "data_entities".to_string(),
                question: "What are the core things the system stores?".to_string(),
                answer: "Projects, tasks and comments".to_string(),
                owner: Some(SpecialistId::DatabaseArchitect),
            },
            AnsweredQuestion {
                question_id: "product_problem".to_string(),
                question: "What problem?".to_string(),
                answer: "Someone else's answer".to_string(),
                owner: Some(SpecialistId::ProductManager),
            },
            AnsweredQuestion {
                question_id: "review_1_clarify_data_model_1".to_string(),
                question: "The reviewer flagged the data_model document".to_string(),
                answer: "Tasks belong to exactly one project".to_string(),
                owner: Some(SpecialistId::DatabaseArchitect),
            },
        ];
        ctx.previous_version = Some(1);
        ctx.revision_notes = vec!["data_model: content is too short".to_string()];

        let doc = specialist.generate_document(&ctx, "data_model").await.unwrap();
        assert_eq!(doc.doc_type, "data_model");
        assert_eq!(doc.owner, SpecialistId::DatabaseArchitect);
        assert!(doc.content.starts_with("# Data Model"));
        assert!(doc.content.contains("Projects, tasks and comments"));
        assert!(doc.content.contains("## Clarifications"));
        assert!(!doc.content.contains("Someone else's answer"));
        assert!(!doc.content.contains("reviewer flagged"));
        assert!(doc.content.contains("Revision of version 1"));
        assert!(doc.content.len() > 80);
    }

    #[test]
    fn test_document_title_falls_back_to_title_case() {
        assert_eq!(document_title("tech_spec"), "Technical Specification");
        assert_eq!(document_title("launch_plan"), "Launch Plan");
    }
}
