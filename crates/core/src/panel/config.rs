//! # Panel Configuration
//!
//! Static routing data: who answers first, who is consulted in which order,
//! which documents a conversation type must produce, and which question ids
//! gate each specialist's document. Pure data; the router never hard-codes it.
//!
//! A JSON file overlays the built-in catalog key by key:
//!
//! ```json
//! {
//!   "discovery_threshold": 8,
//!   "priority_orders": { "tool": ["software_engineer", "solution_architect"] },
//!   "required_questions": { "software_engineer": ["eng_stack"] }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::errors::{PanelError, PanelResult};
use crate::specialists::SpecialistId;
use crate::state::ConversationType;

/// Effective configuration for the panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Answered questions needed before discovery → definition
    pub discovery_threshold: usize,
    /// Turns routed to the first responder before the priority scan
    pub cold_start_turns: usize,
    /// Documents shorter than this (in chars, trimmed) fail review
    pub min_document_length: usize,
    /// Case-insensitive markers that fail review when found in a document
    pub placeholder_markers: Vec<String>,
    /// Template questions a specialist issues per consultation, beyond its
    /// required ones
    pub questions_per_turn: usize,
    pub first_responders: BTreeMap<ConversationType, SpecialistId>,
    pub priority_orders: BTreeMap<ConversationType, Vec<SpecialistId>>,
    pub required_documents: BTreeMap<ConversationType, Vec<String>>,
    /// Required documents for a type with no entry above
    pub default_documents: Vec<String>,
    pub document_owners: BTreeMap<String, SpecialistId>,
    pub required_questions: BTreeMap<SpecialistId, Vec<String>>,
}

/// Partial configuration read from disk
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelConfigOverlay {
    discovery_threshold: Option<usize>,
    cold_start_turns: Option<usize>,
    min_document_length: Option<usize>,
    placeholder_markers: Option<Vec<String>>,
    questions_per_turn: Option<usize>,
    #[serde(default)]
    first_responders: BTreeMap<ConversationType, SpecialistId>,
    #[serde(default)]
    priority_orders: BTreeMap<ConversationType, Vec<SpecialistId>>,
    #[serde(default)]
    required_documents: BTreeMap<ConversationType, Vec<String>>,
    default_documents: Option<Vec<String>>,
    #[serde(default)]
    document_owners: BTreeMap<String, SpecialistId>,
    #[serde(default)]
    required_questions: BTreeMap<SpecialistId, Vec<String>>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PanelConfig {
    fn default() -> Self {
        use ConversationType::*;
        use SpecialistId::*;

        let first_responders = BTreeMap::from([
            (Idea, ProductManager),
            (Feature, UxDesigner),
            (Tool, SoftwareEngineer),
        ]);

        let priority_orders = BTreeMap::from([
            (
                Idea,
                vec![
                    ProductManager,
                    UserResearcher,
                    BusinessAnalyst,
                    UxDesigner,
                    SolutionArchitect,
                    SoftwareEngineer,
                ],
            ),
            (
                Feature,
                vec![UxDesigner, ProductManager, SoftwareEngineer, DatabaseArchitect],
            ),
            (Tool, vec![SoftwareEngineer, DatabaseArchitect, SolutionArchitect]),
        ]);

        let required_documents = BTreeMap::from([
            (
                Idea,
                strings(&[
                    "prd",
                    "persona",
                    "business_case",
                    "design_spec",
                    "architecture",
                    "tech_spec",
                ]),
            ),
            (Feature, strings(&["design_spec", "prd", "tech_spec"])),
            (Tool, strings(&["tech_spec", "data_model"])),
        ]);

        let document_owners = BTreeMap::from([
            ("prd".to_string(), ProductManager),
            ("design_spec".to_string(), UxDesigner),
            ("data_model".to_string(), DatabaseArchitect),
            ("tech_spec".to_string(), SoftwareEngineer),
            ("persona".to_string(), UserResearcher),
            ("business_case".to_string(), BusinessAnalyst),
            ("architecture".to_string(), SolutionArchitect),
        ]);

        let required_questions = BTreeMap::from([
            (
                ProductManager,
                strings(&["product_problem", "product_users", "product_goals", "product_scope"]),
            ),
            (
                UxDesigner,
                strings(&["design_flows", "design_screens", "design_style"]),
            ),
            (
                DatabaseArchitect,
                strings(&["data_entities", "data_relationships", "data_storage"]),
            ),
            (
                SoftwareEngineer,
                strings(&["eng_stack", "eng_components", "eng_integrations"]),
            ),
            (
                UserResearcher,
                strings(&[
                    "research_audience",
                    "research_pain_points",
                    "research_goals",
                    "research_context",
                ]),
            ),
            (
                BusinessAnalyst,
                strings(&["business_model", "business_market", "business_metrics"]),
            ),
            (
                SolutionArchitect,
                strings(&["arch_components", "arch_deployment", "arch_constraints"]),
            ),
        ]);

        Self {
            discovery_threshold: 5,
            cold_start_turns: 3,
            min_document_length: 80,
            placeholder_markers: strings(&["TODO", "to be defined", "TBD"]),
            questions_per_turn: 2,
            first_responders,
            priority_orders,
            required_documents,
            default_documents: strings(&["prd"]),
            document_owners,
            required_questions,
        }
    }
}

impl PanelConfig {
    /// Load a JSON overlay from disk on top of the built-in catalog
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read panel config {}", path.display()))?;
        let config = Self::from_json_str(&raw)
            .with_context(|| format!("Invalid panel config {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded panel config overlay");
        Ok(config)
    }

    /// Parse a JSON overlay on top of the built-in catalog and validate it
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let overlay: PanelConfigOverlay = serde_json::from_str(raw)?;
        let config = Self::default().merged(overlay);
        config.validate()?;
        Ok(config)
    }

    fn merged(mut self, overlay: PanelConfigOverlay) -> Self {
        if let Some(v) = overlay.discovery_threshold {
            self.discovery_threshold = v;
        }
        if let Some(v) = overlay.cold_start_turns {
            self.cold_start_turns = v;
        }
        if let Some(v) = overlay.min_document_length {
            self.min_document_length = v;
        }
        if let Some(v) = overlay.placeholder_markers {
            self.placeholder_markers = v;
        }
        if let Some(v) = overlay.questions_per_turn {
            self.questions_per_turn = v;
        }
        if let Some(v) = overlay.default_documents {
            self.default_documents = v;
        }
        self.first_responders.extend(overlay.first_responders);
        self.priority_orders.extend(overlay.priority_orders);
        self.required_documents.extend(overlay.required_documents);
        self.document_owners.extend(overlay.document_owners);
        self.required_questions.extend(overlay.required_questions);
        self
    }

    /// Reject configs the router could not act on
    pub fn validate(&self) -> PanelResult<()> {
        for ty in ConversationType::ALL {
            let order = self.priority_order(ty);
            if order.is_empty() {
                return Err(PanelError::Config(format!(
                    "priority order for '{}' is empty",
                    ty
                )));
            }

            let mut seen = BTreeSet::new();
            if let Some(dup) = order.iter().find(|id| !seen.insert(**id)) {
                return Err(PanelError::Config(format!(
                    "priority order for '{}' lists {} twice",
                    ty, dup
                )));
            }

            if self.first_responder(ty).is_none() {
                return Err(PanelError::Config(format!(
                    "no first responder for '{}'",
                    ty
                )));
            }

            for doc_type in self.required_doc_types(ty) {
                match self.owner_of_document(doc_type) {
                    None => {
                        return Err(PanelError::Config(format!(
                            "required document '{}' has no owning specialist",
                            doc_type
                        )))
                    }
                    Some(owner) if !order.contains(&owner) => {
                        return Err(PanelError::Config(format!(
                            "'{}' owns required document '{}' but is not in the '{}' priority order",
                            owner, doc_type, ty
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        for doc_type in &self.default_documents {
            if self.owner_of_document(doc_type).is_none() {
                return Err(PanelError::Config(format!(
                    "default document '{}' has no owning specialist",
                    doc_type
                )));
            }
        }

        Ok(())
    }

    pub fn first_responder(&self, ty: ConversationType) -> Option<SpecialistId> {
        self.first_responders.get(&ty).copied()
    }

    pub fn priority_order(&self, ty: ConversationType) -> &[SpecialistId] {
        self.priority_orders
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Specialists that must be consulted and satisfied before review
    pub fn required_specialists(&self, ty: ConversationType) -> &[SpecialistId] {
        self.priority_order(ty)
    }

    pub fn required_doc_types(&self, ty: ConversationType) -> &[String] {
        self.required_documents
            .get(&ty)
            .unwrap_or(&self.default_documents)
    }

    pub fn owner_of_document(&self, doc_type: &str) -> Option<SpecialistId> {
        self.document_owners.get(doc_type).copied()
    }

    /// Document types a specialist is responsible for, in key order
    pub fn documents_owned_by(&self, specialist: SpecialistId) -> Vec<String> {
        self.document_owners
            .iter()
            .filter(|(_, owner)| **owner == specialist)
            .map(|(doc_type, _)| doc_type.clone())
            .collect()
    }

    pub fn required_questions_for(&self, specialist: SpecialistId) -> &[String] {
        self.required_questions
            .get(&specialist)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
