//! # Panel Orchestrator
//!
//! The single serialized event-processing function for one conversation.
//! Every inbound event runs to completion before the next one is read:
//!
//! ```text
//! event ──► apply (answer / note / start)
//!             │
//!             ▼
//!        ┌─ advance ─────────────────────────────────────────┐
//!        │ 1. generate documents for ready specialists       │
//!        │ 2. apply automatic phase transitions              │
//!        │ 3. pending question? surface it and stop          │
//!        │ 4. route: specialist │ review gate │ idle (stop)  │
//!        └───────────────────────────────────────────────────┘
//! ```
//!
//! Specialist calls are the only awaits. A conversation torn down while a
//! call is in flight discards the result.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::{PanelError, PanelResult};
use crate::models::ModelConfig;
use crate::panel::config::PanelConfig;
use crate::panel::context::ConversationContext;
use crate::panel::events::{DocumentSummary, InboundEvent, PanelEvent, ThinkingStatus};
use crate::panel::phase::{self, Phase};
use crate::panel::review::{ReviewGate, SKIP_OPTION};
use crate::panel::router::{self, Route};
use crate::panel::trigger::{DocumentTrigger, TriggerDecision};
use crate::specialists::{ConsistencyChecker, SpecialistId, SpecialistRegistry};
use crate::state::{ConversationType, Message, QuestionKind};

/// Upper bound on routing steps per inbound event
const MAX_STEPS: usize = 64;

/// Shared, read-only collaborators for every conversation
#[derive(Clone)]
pub struct PanelServices {
    pub config: Arc<PanelConfig>,
    pub specialists: Arc<SpecialistRegistry>,
    pub checker: Arc<dyn ConsistencyChecker>,
}

impl PanelServices {
    pub fn new(
        config: Arc<PanelConfig>,
        specialists: Arc<SpecialistRegistry>,
        checker: Arc<dyn ConsistencyChecker>,
    ) -> Self {
        Self {
            config,
            specialists,
            checker,
        }
    }

    /// Template specialists and the glossary checker over `config`
    pub fn with_defaults(config: PanelConfig) -> Self {
        let specialists = SpecialistRegistry::with_defaults(&config);
        Self {
            config: Arc::new(config),
            specialists: Arc::new(specialists),
            checker: Arc::new(crate::specialists::GlossaryConsistencyChecker::new()),
        }
    }
}

/// How a document generation attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Generated,
    NotReady,
    UpToDate,
    Failed,
    Discarded,
}

pub struct Orchestrator {
    ctx: ConversationContext,
    services: PanelServices,
    events: Vec<PanelEvent>,
    event_tx: Option<mpsc::Sender<PanelEvent>>,
    torn_down: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(ctx: ConversationContext, services: PanelServices) -> Self {
        Self {
            ctx,
            services,
            events: Vec::new(),
            event_tx: None,
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stream events as they are produced, in addition to returning them
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PanelEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Share a teardown flag with the owner of this conversation
    pub fn with_teardown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.torn_down = flag;
        self
    }

    pub fn context(&self) -> &ConversationContext {
        &self.ctx
    }

    pub fn into_context(self) -> ConversationContext {
        self.ctx
    }

    pub fn config(&self) -> &PanelConfig {
        &self.services.config
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Routing decision for the current state, with nobody skipped
    pub fn next_route(&self) -> Route {
        let reactivated = self.ctx.reactivated();
        let skipped = BTreeSet::new();
        router::next_specialist(
            &self.ctx.routing_inputs(&reactivated, &skipped),
            &self.services.config,
        )
    }

    /// Process one inbound event and return everything it emitted
    #[tracing::instrument(skip(self, event), fields(conversation_id = %self.ctx.id(), kind = event.kind()))]
    pub async fn handle(&mut self, event: InboundEvent) -> Vec<PanelEvent> {
        if let Err(err) = self.dispatch(event).await {
            tracing::warn!(error = %err, code = err.code(), "Event rejected");
            self.emit(PanelEvent::error(&err)).await;
        }
        std::mem::take(&mut self.events)
    }

    async fn emit(&mut self, event: PanelEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event.clone()).await.is_err() {
                tracing::debug!(kind = event.kind(), "Event receiver gone; event not streamed");
            }
        }
        self.events.push(event);
    }

    async fn ack(&mut self, received: &str, queued: bool) {
        self.emit(PanelEvent::Ack {
            received: received.to_string(),
            queued,
        })
        .await;
    }

    async fn dispatch(&mut self, event: InboundEvent) -> PanelResult<()> {
        match event {
            InboundEvent::StartConversation {
                conversation_type,
                selected_model,
            } => self.start(conversation_type, selected_model).await,
            InboundEvent::UserMessage {
                content,
                question_id,
            } => self.user_message(content, question_id).await,
            InboundEvent::Typing => Ok(()),
            InboundEvent::Heartbeat => {
                self.ack("heartbeat", false).await;
                Ok(())
            }
            InboundEvent::AcceptTransition => {
                self.ctx.ensure_mutable("accept_transition")?;
                self.ctx.transition_declined = false;
                self.ctx.transition_offered = true;
                self.ack("accept_transition", false).await;
                self.advance().await
            }
            InboundEvent::DeclineTransition => {
                self.ctx.ensure_mutable("decline_transition")?;
                self.ctx.transition_declined = true;
                self.ack("decline_transition", false).await;
                Ok(())
            }
        }
    }

    async fn start(
        &mut self,
        conversation_type: ConversationType,
        selected_model: Option<String>,
    ) -> PanelResult<()> {
        self.ctx.ensure_mutable("start_conversation")?;

        if let Some(model) = selected_model.as_deref().and_then(ModelConfig::parse) {
            self.ctx.model = Some(model);
        }

        if !self.ctx.conversation.is_pristine() {
            if conversation_type != self.ctx.conversation.conversation_type {
                tracing::warn!(
                    requested = %conversation_type,
                    current = %self.ctx.conversation.conversation_type,
                    "Conversation already started; keeping its type"
                );
            }
            self.ack("start_conversation", false).await;
            return Ok(());
        }

        self.ctx.conversation.conversation_type = conversation_type;
        tracing::info!(conversation_type = %conversation_type, "Conversation started");
        self.system_message(format!(
            "Started a new {} conversation. The panel will ask a few questions before drafting documents.",
            conversation_type
        ))
        .await;
        self.advance().await
    }

    async fn user_message(&mut self, content: String, question_id: Option<String>) -> PanelResult<()> {
        self.ctx.ensure_mutable("user_message")?;
        self.ctx.conversation.push_message(Message::user(content.clone()));

        let target = match question_id {
            Some(id) if !self.ctx.ledger.is_issued(&id) => {
                let err = PanelError::UnknownQuestion { question_id: id };
                tracing::warn!(error = %err, "Answer for unknown question");
                self.emit(PanelEvent::error(&err)).await;
                self.resurface_pending().await;
                return Ok(());
            }
            Some(id) => Some(id),
            None => self.ctx.ledger.next_pending().map(|q| q.id.clone()),
        };

        match target {
            Some(id) => {
                self.ctx.ledger.record_answer(&id, &content)?;
                tracing::debug!(question_id = %id, "Answer recorded");
                self.ack("user_message", false).await;
                self.apply_validation_answer(&id, &content);
                self.apply_clarification_answer(&id, &content)?;
            }
            None => {
                self.ctx.notes.push(content);
                self.ack("user_message", true).await;
            }
        }

        self.advance().await
    }

    /// A missing-document answer either waives the type or re-opens its owner
    fn apply_validation_answer(&mut self, question_id: &str, answer: &str) {
        let Some(doc_type) = self.ctx.pending_validations.remove(question_id) else {
            return;
        };

        if answer.trim().eq_ignore_ascii_case(SKIP_OPTION) {
            tracing::info!(doc_type = %doc_type, "Required document waived");
            self.ctx.waived_documents.insert(doc_type);
        } else if let Some(owner) = self.services.config.owner_of_document(&doc_type) {
            self.ctx
                .reactivated
                .entry(owner)
                .or_default()
                .push(format!("missing: {}", doc_type));
        }
    }

    /// A clarifying answer replaces the earlier answer the reviewer flagged
    fn apply_clarification_answer(&mut self, question_id: &str, answer: &str) -> PanelResult<()> {
        let Some(source) = self.ctx.pending_clarifications.remove(question_id) else {
            return Ok(());
        };
        self.ctx.ledger.record_answer(&source, answer)?;
        tracing::info!(question_id, source = %source, "Clarification replaced earlier answer");
        Ok(())
    }

    async fn advance(&mut self) -> PanelResult<()> {
        let mut skipped = BTreeSet::new();
        // an offer made during this event waits for the user's next event
        let mut offer_pending = false;

        for _ in 0..MAX_STEPS {
            if self.is_torn_down() || self.ctx.conversation.phase().is_terminal() {
                return Ok(());
            }

            if self.generate_ready_documents(&mut skipped).await == Generation::Discarded {
                return Ok(());
            }

            self.apply_automatic_transitions(&mut offer_pending).await?;

            if self.ctx.ledger.has_pending() {
                self.surface_pending().await;
                return Ok(());
            }

            let reactivated = self.ctx.reactivated();
            let route = router::next_specialist(
                &self.ctx.routing_inputs(&reactivated, &skipped),
                &self.services.config,
            );
            tracing::debug!(route = ?route, "Routing decision");

            match route {
                Route::Specialist(id) => {
                    if self.consult(id, &mut skipped).await == Generation::Discarded {
                        return Ok(());
                    }
                }
                Route::ReviewGate => self.run_review().await?,
                Route::Idle => return Ok(()),
            }
        }

        tracing::warn!(max_steps = MAX_STEPS, "Routing step budget exhausted");
        Ok(())
    }

    async fn apply_automatic_transitions(&mut self, offer_pending: &mut bool) -> PanelResult<()> {
        loop {
            let next = phase::next_automatic(&self.ctx.phase_inputs(&self.services.config));
            let Some(to) = next else {
                return Ok(());
            };

            if to == Phase::Definition && (*offer_pending || !self.ctx.transition_offered) {
                if !self.ctx.transition_offered {
                    self.ctx.transition_offered = true;
                    *offer_pending = true;
                    self.system_message(
                        "The panel has enough context to start drafting documents. \
                         Send accept_transition to move on now, or decline_transition to keep exploring."
                            .to_string(),
                    )
                    .await;
                }
                return Ok(());
            }
            self.change_phase(to).await?;
        }
    }

    async fn change_phase(&mut self, to: Phase) -> PanelResult<()> {
        let transition = phase::transition(&mut self.ctx.conversation, to)?;
        self.emit(PanelEvent::PhaseChanged {
            from: transition.from,
            to: transition.to,
        })
        .await;
        Ok(())
    }

    async fn system_message(&mut self, content: String) {
        self.ctx.conversation.push_message(Message::system(content.clone()));
        self.emit(PanelEvent::AgentMessage {
            agent_id: None,
            content,
        })
        .await;
    }

    /// Send the oldest pending question unless it was already sent
    async fn surface_pending(&mut self) {
        let Some(question) = self.ctx.ledger.next_pending().cloned() else {
            return;
        };
        if !self.ctx.surfaced.insert(question.id.clone()) {
            return;
        }

        let message = match question.owner {
            Some(owner) => Message::agent(owner, question.content.clone()),
            None => Message::system(question.content.clone()),
        };
        self.ctx.conversation.push_message(message);
        self.emit(PanelEvent::AgentQuestion {
            agent_id: question.owner,
            question,
        })
        .await;
    }

    async fn resurface_pending(&mut self) {
        if let Some(id) = self.ctx.ledger.next_pending().map(|q| q.id.clone()) {
            self.ctx.surfaced.remove(&id);
        }
        self.surface_pending().await;
    }

    async fn specialist_failed(&mut self, id: SpecialistId, reason: String, skipped: &mut BTreeSet<SpecialistId>) {
        skipped.insert(id);
        let err = PanelError::SpecialistUnavailable {
            specialist: id,
            reason,
        };
        tracing::warn!(specialist = %id, error = %err, "Specialist skipped for this event");
        self.emit(PanelEvent::error(&err)).await;
    }

    async fn consult(&mut self, id: SpecialistId, skipped: &mut BTreeSet<SpecialistId>) -> Generation {
        let Some(specialist) = self.services.specialists.get(id) else {
            self.specialist_failed(id, "not registered".to_string(), skipped).await;
            return Generation::Failed;
        };

        self.emit(PanelEvent::AgentThinking {
            agent_id: id,
            status: ThinkingStatus::Thinking,
        })
        .await;

        let view = self.ctx.specialist_context(id, &self.services.config);
        let result = specialist.generate_questions(&view).await;
        if self.is_torn_down() {
            tracing::debug!(specialist = %id, "Conversation torn down; discarding questions");
            return Generation::Discarded;
        }

        self.emit(PanelEvent::AgentThinking {
            agent_id: id,
            status: ThinkingStatus::Done,
        })
        .await;

        let questions = match result {
            Ok(questions) => questions,
            Err(e) => {
                self.specialist_failed(id, e.to_string(), skipped).await;
                return Generation::Failed;
            }
        };

        if !self.ctx.conversation.has_consulted(id) {
            let intro = format!("{} joined the conversation.", id.display_name());
            self.ctx.conversation.push_message(Message::agent(id, intro.clone()));
            self.emit(PanelEvent::AgentMessage {
                agent_id: Some(id),
                content: intro,
            })
            .await;
        }
        self.ctx.conversation.record_consultation(id);

        let mut issued = 0;
        for mut question in questions {
            question.owner.get_or_insert(id);
            if self.ctx.ledger.record_issued(question) {
                issued += 1;
            }
        }
        tracing::info!(specialist = %id, issued, "Specialist consulted");

        if self.ctx.reactivated.contains_key(&id) && !self.ctx.ledger.has_pending_for(id) {
            let outcome = self.generate_for(id, true, skipped).await;
            if matches!(outcome, Generation::Generated | Generation::NotReady | Generation::UpToDate) {
                self.ctx.reactivated.remove(&id);
            }
            return outcome;
        }

        Generation::UpToDate
    }

    /// First-time generation for every consulted specialist that is ready
    async fn generate_ready_documents(&mut self, skipped: &mut BTreeSet<SpecialistId>) -> Generation {
        let mut last = Generation::UpToDate;
        for id in self.ctx.conversation.consulted() {
            if skipped.contains(&id) || self.ctx.reactivated.contains_key(&id) {
                continue;
            }
            last = self.generate_for(id, false, skipped).await;
            if last == Generation::Discarded {
                return last;
            }
        }
        last
    }

    async fn generate_for(
        &mut self,
        id: SpecialistId,
        regenerate: bool,
        skipped: &mut BTreeSet<SpecialistId>,
    ) -> Generation {
        let decision = DocumentTrigger::evaluate(
            &self.services.config,
            &self.ctx.ledger,
            &self.ctx.documents,
            id,
            &self.ctx.waived_documents,
            regenerate,
        );

        let doc_types = match decision {
            TriggerDecision::Generate { doc_types } => doc_types,
            TriggerDecision::NotReady { missing } => {
                tracing::debug!(specialist = %id, missing = ?missing, "Not enough info for documents");
                return Generation::NotReady;
            }
            TriggerDecision::UpToDate => return Generation::UpToDate,
        };

        let Some(specialist) = self.services.specialists.get(id) else {
            self.specialist_failed(id, "not registered".to_string(), skipped).await;
            return Generation::Failed;
        };
        if !specialist.has_enough_info(&self.ctx.specialist_context(id, &self.services.config)) {
            return Generation::NotReady;
        }

        self.emit(PanelEvent::GeneratingDocuments { agent_id: id }).await;

        for doc_type in doc_types {
            let view = self.ctx.specialist_context(id, &self.services.config);
            let result = specialist.generate_document(&view, &doc_type).await;
            if self.is_torn_down() {
                tracing::debug!(specialist = %id, doc_type = %doc_type, "Conversation torn down; discarding document");
                return Generation::Discarded;
            }

            let mut document = match result {
                Ok(document) => document,
                Err(e) => {
                    self.specialist_failed(id, e.to_string(), skipped).await;
                    return Generation::Failed;
                }
            };
            document.doc_type = doc_type;
            document.owner = id;

            let recorded = self.ctx.documents.record(document);
            tracing::info!(
                specialist = %id,
                doc_type = %recorded.doc_type,
                version = recorded.version,
                "Document generated"
            );
            let update = PanelEvent::DocumentUpdate {
                document_type: recorded.doc_type.clone(),
                content: recorded.content.clone(),
                version: recorded.version,
                status: recorded.status,
            };
            self.emit(update).await;
        }

        Generation::Generated
    }

    async fn run_review(&mut self) -> PanelResult<()> {
        self.ctx.review_passes += 1;
        let mut outcome = {
            let gate = ReviewGate::new(&self.services.config, self.services.checker.as_ref());
            gate.review(
                &self.ctx.conversation,
                &self.ctx.documents,
                &self.ctx.waived_documents,
                self.ctx.review_passes,
            )
        };

        self.ctx.last_review = Some(outcome.result.clone());
        self.emit(PanelEvent::ReviewCompleted {
            result: outcome.result.clone(),
        })
        .await;

        if let Some(approval) = outcome.approval.take() {
            self.ctx.documents.approve_all(&approval);
            let transition = phase::complete(&mut self.ctx.conversation, approval)?;
            self.emit(PanelEvent::PhaseChanged {
                from: transition.from,
                to: transition.to,
            })
            .await;

            let documents = self
                .ctx
                .documents
                .latest_all()
                .into_iter()
                .map(DocumentSummary::from)
                .collect();
            self.emit(PanelEvent::DocumentsReady { documents }).await;
            self.system_message("All documents were approved. The conversation is complete.".to_string())
                .await;
            return Ok(());
        }

        for doc_type in &outcome.flagged_documents {
            self.ctx.documents.mark_needs_revision(doc_type);
        }
        for question in &outcome.questions {
            if question.kind == QuestionKind::Clarifying {
                if let Some(owner) = question.owner {
                    self.ctx
                        .reactivated
                        .entry(owner)
                        .or_default()
                        .push(question.content.clone());
                }
            }
        }
        for id in &outcome.implicated {
            self.ctx.reactivated.entry(*id).or_default();
        }
        for question in &outcome.questions {
            let Some(evidence) = outcome.evidence.get(&question.id) else {
                continue;
            };
            if let Some(source) = self.ctx.answer_containing(evidence, question.owner) {
                self.ctx.pending_clarifications.insert(question.id.clone(), source);
            }
        }

        self.change_phase(Phase::Definition).await?;

        // validation questions line up with the missing doc types
        let missing = std::mem::take(&mut outcome.missing);
        let mut missing = missing.into_iter();
        for question in outcome.questions {
            if question.kind == QuestionKind::Validation {
                if let Some(doc_type) = missing.next() {
                    self.ctx.pending_validations.insert(question.id.clone(), doc_type);
                }
            }
            self.ctx.ledger.record_issued(question);
        }
        Ok(())
    }
}
