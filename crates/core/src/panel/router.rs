//! # Router
//!
//! Picks who acts next. A pure function of its inputs: the same
//! `(conversation type, phase, agent history, reactivated, skipped)` always
//! yields the same route.
//!
//! 1. review → the review gate
//! 2. completed → nobody
//! 3. cold start → the type's first responder
//! 4. otherwise the first specialist in the type's priority order that has
//!    not been consulted yet (or was re-opened by a revision)
//! 5. nobody left → idle

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::panel::config::PanelConfig;
use crate::panel::phase::Phase;
use crate::specialists::SpecialistId;
use crate::state::ConversationType;

/// Outcome of a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "specialist", rename_all = "snake_case")]
pub enum Route {
    Specialist(SpecialistId),
    ReviewGate,
    /// Awaiting user input or document generation
    Idle,
}

/// Inputs to a routing decision
pub struct RoutingInputs<'a> {
    pub conversation_type: ConversationType,
    pub phase: Phase,
    pub agent_history: &'a [SpecialistId],
    /// Specialists re-opened by a revision request
    pub reactivated: &'a BTreeSet<SpecialistId>,
    /// Specialists that failed earlier in the current event
    pub skipped: &'a BTreeSet<SpecialistId>,
}

/// Select the next specialist, the review gate, or nobody
pub fn next_specialist(inputs: &RoutingInputs<'_>, config: &PanelConfig) -> Route {
    match inputs.phase {
        Phase::Review => return Route::ReviewGate,
        Phase::Completed => return Route::Idle,
        Phase::Discovery | Phase::Definition => {}
    }

    if inputs.agent_history.len() < config.cold_start_turns {
        if let Some(first) = config.first_responder(inputs.conversation_type) {
            if !inputs.skipped.contains(&first) {
                return Route::Specialist(first);
            }
        }
    }

    let available = |id: &SpecialistId| !inputs.skipped.contains(id);
    let open = |id: &SpecialistId| {
        !inputs.agent_history.contains(id) || inputs.reactivated.contains(id)
    };

    let order = config.priority_order(inputs.conversation_type);
    if let Some(id) = order.iter().copied().find(|id| open(id) && available(id)) {
        return Route::Specialist(id);
    }

    // owners re-opened by review that sit outside the priority order
    if let Some(id) = inputs
        .reactivated
        .iter()
        .copied()
        .find(|id| !order.contains(id) && available(id))
    {
        return Route::Specialist(id);
    }

    Route::Idle
}
