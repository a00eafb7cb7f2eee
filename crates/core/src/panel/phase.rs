//! # Phase State Machine
//!
//! ```text
//! discovery ──▶ definition ──▶ review ──▶ completed
//!                   ▲             │
//!                   └─ revision ──┘
//! ```
//!
//! `discovery → definition` is the only transition the user can decline.
//! `review → completed` requires an [`Approval`] minted by the review gate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{PanelError, PanelResult};
use crate::panel::config::PanelConfig;
use crate::panel::review::Approval;
use crate::panel::trigger::DocumentTrigger;
use crate::state::{Conversation, QuestionLedger};

/// Macro-stage of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Definition,
    Review,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Definition => "definition",
            Phase::Review => "review",
            Phase::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Phase::Completed
    }

    /// Whether `self → to` is one of the legal edges
    pub fn can_transition_to(&self, to: Phase) -> bool {
        matches!(
            (self, to),
            (Phase::Discovery, Phase::Definition)
                | (Phase::Definition, Phase::Review)
                | (Phase::Review, Phase::Completed)
                | (Phase::Review, Phase::Definition)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase change that happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

/// Everything the automatic transition checks look at
pub struct PhaseInputs<'a> {
    pub conversation: &'a Conversation,
    pub ledger: &'a QuestionLedger,
    pub config: &'a PanelConfig,
    /// User declined moving on from discovery
    pub transition_declined: bool,
    /// Specialists still re-opened by a revision request
    pub revisions_outstanding: bool,
}

/// Target of the automatic transition that currently applies, if any.
///
/// Pure: the same inputs always give the same answer.
pub fn next_automatic(inputs: &PhaseInputs<'_>) -> Option<Phase> {
    match inputs.conversation.phase() {
        Phase::Discovery => {
            let reached = inputs.ledger.answered_count() >= inputs.config.discovery_threshold;
            (reached && !inputs.transition_declined).then_some(Phase::Definition)
        }
        Phase::Definition => {
            (definition_complete(inputs) && !inputs.revisions_outstanding && !inputs.ledger.has_pending())
                .then_some(Phase::Review)
        }
        // review exits only through the gate; completed never exits
        Phase::Review | Phase::Completed => None,
    }
}

/// Every required specialist has been consulted and has its required
/// questions answered.
pub fn definition_complete(inputs: &PhaseInputs<'_>) -> bool {
    let ty = inputs.conversation.conversation_type;
    inputs.config.required_specialists(ty).iter().all(|id| {
        inputs.conversation.has_consulted(*id)
            && DocumentTrigger::has_enough_info(
                inputs.ledger,
                inputs.config.required_questions_for(*id),
            )
    })
}

/// Apply a non-completing transition.
///
/// Fails with `TerminalState` from `completed` and `IllegalTransition` for
/// any edge not in the machine. `completed` is reachable only via [`complete`].
pub fn transition(conversation: &mut Conversation, to: Phase) -> PanelResult<Transition> {
    let from = conversation.phase();
    if from.is_terminal() {
        return Err(PanelError::TerminalState {
            conversation_id: conversation.id.clone(),
            operation: format!("transition to {}", to),
        });
    }
    if to == Phase::Completed || !from.can_transition_to(to) {
        return Err(PanelError::IllegalTransition { from, to });
    }

    conversation.set_phase(to);
    tracing::info!(
        conversation_id = %conversation.id,
        from = %from,
        to = %to,
        "Phase transition"
    );
    Ok(Transition { from, to })
}

/// `review → completed`, consuming the gate's approval.
pub fn complete(conversation: &mut Conversation, _approval: Approval) -> PanelResult<Transition> {
    let from = conversation.phase();
    if from.is_terminal() {
        return Err(PanelError::TerminalState {
            conversation_id: conversation.id.clone(),
            operation: "complete".to_string(),
        });
    }
    if from != Phase::Review {
        return Err(PanelError::IllegalTransition {
            from,
            to: Phase::Completed,
        });
    }

    conversation.set_phase(Phase::Completed);
    tracing::info!(conversation_id = %conversation.id, "Conversation completed");
    Ok(Transition {
        from,
        to: Phase::Completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::SpecialistId;
    use crate::state::{ConversationType, Question, QuestionKind};

    fn answered_ledger(count: usize) -> QuestionLedger {
        let mut ledger = QuestionLedger::new();
        for i in 0..count {
            let id = format!("q{}", i);
            ledger.record_issued(Question::new(&id, "?", QuestionKind::Template));
            ledger.record_answer(&id, "a").unwrap();
        }
        ledger
    }

    #[test]
    fn test_legal_edges() {
        assert!(Phase::Discovery.can_transition_to(Phase::Definition));
        assert!(Phase::Review.can_transition_to(Phase::Definition));
        assert!(!Phase::Discovery.can_transition_to(Phase::Review));
        assert!(!Phase::Definition.can_transition_to(Phase::Discovery));
        assert!(!Phase::Completed.can_transition_to(Phase::Definition));
    }

    #[test]
    fn test_discovery_threshold_and_decline() {
        let config = PanelConfig::default();
        let conversation = Conversation::with_id("c", ConversationType::Idea);

        let below = answered_ledger(4);
        let inputs = PhaseInputs {
            conversation: &conversation,
            ledger: &below,
            config: &config,
            transition_declined: false,
            revisions_outstanding: false,
        };
        assert_eq!(next_automatic(&inputs), None);

        let reached = answered_ledger(5);
        let inputs = PhaseInputs {
            ledger: &reached,
            ..inputs
        };
        assert_eq!(next_automatic(&inputs), Some(Phase::Definition));

        let inputs = PhaseInputs {
            transition_declined: true,
            ..inputs
        };
        assert_eq!(next_automatic(&inputs), None);
    }

    #[test]
    fn test_definition_requires_every_required_specialist() {
        let mut config = PanelConfig::default();
        config.priority_orders.insert(
            ConversationType::Tool,
            vec![SpecialistId::SoftwareEngineer],
        );
        config
            .required_questions
            .insert(SpecialistId::SoftwareEngineer, vec!["eng_stack".to_string()]);

        let mut conversation = Conversation::with_id("c", ConversationType::Tool);
        conversation.set_phase(Phase::Definition);

        let mut ledger = QuestionLedger::new();
        ledger.record_issued(
            Question::new("eng_stack", "Stack?", QuestionKind::Template)
                .required()
                .owned_by(SpecialistId::SoftwareEngineer),
        );
        ledger.record_answer("eng_stack", "Rust").unwrap();

        {
            let inputs = PhaseInputs {
                conversation: &conversation,
                ledger: &ledger,
                config: &config,
                transition_declined: false,
                revisions_outstanding: false,
            };
            // answered but never consulted
            assert_eq!(next_automatic(&inputs), None);
        }

        conversation.record_consultation(SpecialistId::SoftwareEngineer);
        let inputs = PhaseInputs {
            conversation: &conversation,
            ledger: &ledger,
            config: &config,
            transition_declined: false,
            revisions_outstanding: false,
        };
        assert_eq!(next_automatic(&inputs), Some(Phase::Review));

        let inputs = PhaseInputs {
            revisions_outstanding: true,
            ..inputs
        };
        assert_eq!(next_automatic(&inputs), None);
    }

    #[test]
    fn test_transition_rejects_completion_and_illegal_edges() {
        let mut conversation = Conversation::with_id("c", ConversationType::Feature);

        assert_eq!(
            transition(&mut conversation, Phase::Review),
            Err(PanelError::IllegalTransition {
                from: Phase::Discovery,
                to: Phase::Review
            })
        );

        transition(&mut conversation, Phase::Definition).unwrap();
        transition(&mut conversation, Phase::Review).unwrap();
        assert!(matches!(
            transition(&mut conversation, Phase::Completed),
            Err(PanelError::IllegalTransition { .. })
        ));

        let back = transition(&mut conversation, Phase::Definition).unwrap();
        assert_eq!(back.from, Phase::Review);
        assert_eq!(conversation.phase(), Phase::Definition);
    }

    #[test]
    fn test_transition_from_completed_is_terminal() {
        let mut conversation = Conversation::with_id("c", ConversationType::Feature);
        conversation.set_phase(Phase::Completed);

        assert!(matches!(
            transition(&mut conversation, Phase::Definition),
            Err(PanelError::TerminalState { .. })
        ));
    }
}
