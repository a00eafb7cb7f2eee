//! # Conversation Session
//!
//! Runs one conversation's orchestrator on its own task so events for that
//! conversation are processed strictly in order while other conversations
//! proceed independently.
//!
//! ```text
//! transport                          session task
//!     │                                   │
//!     ├─── InboundEvent (inbox) ────────▶ │ orchestrator.handle()
//!     │ ◀──── PanelEvent (stream) ────────┤
//!     │ ◀──── SessionStatus (watch) ──────┤
//!     │                                   │
//!     └─── teardown ────────────────────▶ └── ConversationSnapshot
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::panel::context::ConversationContext;
use crate::panel::events::{InboundEvent, PanelEvent};
use crate::panel::orchestrator::{Orchestrator, PanelServices};
use crate::panel::phase::Phase;
use crate::specialists::SpecialistId;
use crate::state::{ConversationSnapshot, ConversationType};

/// Latest observable state of a live session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub conversation_id: String,
    pub conversation_type: ConversationType,
    pub phase: Phase,
    pub agents_consulted: Vec<SpecialistId>,
    pub answered: usize,
    pub pending: usize,
    pub documents: Vec<String>,
}

impl From<&ConversationContext> for SessionStatus {
    fn from(ctx: &ConversationContext) -> Self {
        Self {
            conversation_id: ctx.id().to_string(),
            conversation_type: ctx.conversation.conversation_type,
            phase: ctx.conversation.phase(),
            agents_consulted: ctx.conversation.consulted(),
            answered: ctx.ledger.answered_count(),
            pending: ctx.ledger.pending_ids().len(),
            documents: ctx.documents.doc_types().into_iter().map(String::from).collect(),
        }
    }
}

/// Handle for a running session
pub struct SessionHandle {
    pub conversation_id: String,
    inbox_tx: mpsc::Sender<InboundEvent>,
    status_rx: watch::Receiver<SessionStatus>,
    torn_down: Arc<AtomicBool>,
    shutdown_tx: oneshot::Sender<()>,
    task_handle: JoinHandle<ConversationSnapshot>,
}

impl SessionHandle {
    /// Queue an event; it is processed after every event queued before it
    pub async fn send(&self, event: InboundEvent) -> anyhow::Result<()> {
        self.inbox_tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("Session {} is closed", self.conversation_id))
    }

    /// Inbox sender for queuing without holding a borrow of the handle
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.inbox_tx.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Stop the session and return its final state.
    ///
    /// Work in flight is discarded rather than applied.
    pub async fn teardown(self) -> anyhow::Result<ConversationSnapshot> {
        self.torn_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
        self.task_handle
            .await
            .map_err(|e| anyhow::anyhow!("Session task failed: {}", e))
    }
}

/// Spawn a session task for `ctx`.
///
/// Outbound events are streamed to `events_tx` as they are produced.
pub fn spawn_session(
    ctx: ConversationContext,
    services: PanelServices,
    events_tx: mpsc::Sender<PanelEvent>,
) -> SessionHandle {
    let (inbox_tx, mut inbox_rx) = mpsc::channel::<InboundEvent>(32);
    let (status_tx, status_rx) = watch::channel(SessionStatus::from(&ctx));
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let torn_down = Arc::new(AtomicBool::new(false));
    let conversation_id = ctx.id().to_string();

    let mut orchestrator = Orchestrator::new(ctx, services)
        .with_event_channel(events_tx)
        .with_teardown_flag(Arc::clone(&torn_down));

    let task_handle = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                event = inbox_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if orchestrator.is_torn_down() {
                break;
            }
            // a client that stops reading blocks emit; teardown still wins
            let emitted = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                emitted = orchestrator.handle(event) => emitted,
            };
            tracing::trace!(emitted = emitted.len(), "Event processed");
            status_tx.send_replace(SessionStatus::from(orchestrator.context()));
        }
        tracing::debug!(conversation_id = %orchestrator.context().id(), "Session closed");
        orchestrator.into_context().snapshot()
    });

    SessionHandle {
        conversation_id,
        inbox_tx,
        status_rx,
        torn_down,
        shutdown_tx,
        task_handle,
    }
}
