//! # Specialist Registry
//!
//! Ordered catalog of the specialists available to a panel. The router only
//! ever dispatches to ids registered here.

use std::sync::Arc;

use super::{Specialist, SpecialistId, TemplateSpecialist};
use crate::panel::config::PanelConfig;

#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    specialists: Vec<Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template-backed specialist for every id in the catalog
    pub fn with_defaults(config: &PanelConfig) -> Self {
        let mut registry = Self::new();
        for id in SpecialistId::ALL {
            registry.register(Arc::new(TemplateSpecialist::new(id, config.questions_per_turn)));
        }
        registry
    }

    /// Add a specialist, replacing any existing one with the same id
    pub fn register(&mut self, specialist: Arc<dyn Specialist>) {
        let id = specialist.id();
        match self.specialists.iter().position(|s| s.id() == id) {
            Some(index) => self.specialists[index] = specialist,
            None => self.specialists.push(specialist),
        }
    }

    pub fn get(&self, id: SpecialistId) -> Option<Arc<dyn Specialist>> {
        self.specialists.iter().find(|s| s.id() == id).cloned()
    }

    pub fn contains(&self, id: SpecialistId) -> bool {
        self.specialists.iter().any(|s| s.id() == id)
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<SpecialistId> {
        self.specialists.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistRegistry")
            .field("specialists", &self.ids())
            .finish()
    }
}
