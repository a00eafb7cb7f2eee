//! # Session Registry
//!
//! Owns the live sessions keyed by conversation id. Ending a session
//! archives its final snapshot when an archive database is configured.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::panel::context::ConversationContext;
use crate::panel::events::{InboundEvent, PanelEvent};
use crate::panel::orchestrator::PanelServices;
use crate::panel::session::{spawn_session, SessionHandle, SessionStatus};
use crate::state::{ArchiveManager, ConclaveDb, ConversationSnapshot, ConversationType};

pub struct SessionRegistry {
    services: PanelServices,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    archive: Option<Arc<ConclaveDb>>,
}

impl SessionRegistry {
    pub fn new(services: PanelServices) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
            archive: None,
        }
    }

    /// Archive torn-down sessions into `db`
    pub fn with_archive(mut self, db: Arc<ConclaveDb>) -> Self {
        self.archive = Some(db);
        self
    }

    pub fn services(&self) -> &PanelServices {
        &self.services
    }

    /// Start a session for a new conversation and return its id
    pub async fn open(
        &self,
        conversation_type: ConversationType,
        events_tx: mpsc::Sender<PanelEvent>,
    ) -> String {
        let ctx = ConversationContext::new(conversation_type);
        let id = ctx.id().to_string();
        let handle = spawn_session(ctx, self.services.clone(), events_tx);

        self.sessions.write().await.insert(id.clone(), handle);
        tracing::info!(conversation_id = %id, conversation_type = %conversation_type, "Session opened");
        id
    }

    /// Route an event to its conversation's session
    pub async fn dispatch(&self, conversation_id: &str, event: InboundEvent) -> anyhow::Result<()> {
        let inbox = self
            .sessions
            .read()
            .await
            .get(conversation_id)
            .map(SessionHandle::sender)
            .ok_or_else(|| anyhow::anyhow!("No live session for conversation {}", conversation_id))?;

        // the lock is released before waiting on a possibly full inbox
        inbox
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("Session {} is closed", conversation_id))
    }

    pub async fn status(&self, conversation_id: &str) -> Option<SessionStatus> {
        self.sessions.read().await.get(conversation_id).map(|h| h.status())
    }

    /// Status of every live session, ordered by id
    pub async fn active(&self) -> Vec<SessionStatus> {
        let mut statuses: Vec<SessionStatus> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionHandle::status)
            .collect();
        statuses.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
        statuses
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// End a session, discard its in-flight work, and archive what it had.
    ///
    /// Returns `None` when no such session is live. Archive failures are
    /// logged; the snapshot is still returned.
    pub async fn teardown(&self, conversation_id: &str) -> anyhow::Result<Option<ConversationSnapshot>> {
        let Some(handle) = self.sessions.write().await.remove(conversation_id) else {
            return Ok(None);
        };

        let snapshot = handle.teardown().await?;
        tracing::info!(
            conversation_id = %conversation_id,
            phase = %snapshot.conversation.phase(),
            "Session torn down"
        );

        if let Some(db) = &self.archive {
            if let Err(e) = ArchiveManager::new(db).save(&snapshot) {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to archive conversation");
            }
        }

        Ok(Some(snapshot))
    }

    /// Tear down every live session
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.teardown(&id).await {
                tracing::warn!(conversation_id = %id, error = %e, "Teardown failed");
            }
        }
    }
}
