//! # Conversations API
//!
//! Read-only views of live sessions, the conversation archive and the
//! effective panel configuration. Conversations themselves are driven over
//! the WebSocket.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use conclave_core::panel::SessionStatus;
use conclave_core::state::{ArchiveManager, ArchiveSummary, Document};

use crate::api::ApiError;
use crate::SharedState;

const DEFAULT_ARCHIVE_LIMIT: usize = 50;
const MAX_ARCHIVE_LIMIT: usize = 500;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
}

/// A live session as seen from outside
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStatusResponse {
    pub id: String,
    pub conversation_type: String,
    pub phase: String,
    pub agents_consulted: Vec<String>,
    pub answered: usize,
    pub pending: usize,
    pub documents: Vec<String>,
}

impl From<SessionStatus> for ConversationStatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            id: status.conversation_id,
            conversation_type: status.conversation_type.to_string(),
            phase: status.phase.to_string(),
            agents_consulted: status
                .agents_consulted
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            answered: status.answered,
            pending: status.pending,
            documents: status.documents,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummaryResponse {
    pub id: String,
    pub conversation_type: String,
    pub phase: String,
    pub agents_consulted: u32,
    /// RFC 3339
    pub archived_at: String,
}

impl From<ArchiveSummary> for ArchiveSummaryResponse {
    fn from(summary: ArchiveSummary) -> Self {
        Self {
            id: summary.id,
            conversation_type: summary.conversation_type,
            phase: summary.phase,
            agents_consulted: summary.agents_consulted,
            archived_at: summary.archived_at.to_rfc3339(),
        }
    }
}

/// One archived version of a requirement document
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersionResponse {
    pub doc_type: String,
    pub version: u32,
    pub status: String,
    pub owner: String,
    pub content: String,
    /// RFC 3339
    pub created_at: String,
}

impl From<Document> for DocumentVersionResponse {
    fn from(document: Document) -> Self {
        Self {
            doc_type: document.doc_type,
            version: document.version,
            status: document.status.as_str().to_string(),
            owner: document.owner.as_str().to_string(),
            content: document.content,
            created_at: document.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub specialists: Vec<String>,
    /// The full `PanelConfig`
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArchiveQuery {
    /// Maximum entries to return (1-500, default 50)
    pub limit: Option<usize>,
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:id", get(get_conversation))
        .route("/archive", get(list_archive))
        .route("/archive/:id", get(get_archived))
        .route("/archive/:id/documents/:doc_type", get(get_document_history))
        .route("/config", get(get_config))
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "conversations",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.registry.len().await,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "conversations",
    responses((status = 200, description = "Live sessions ordered by id", body = Vec<ConversationStatusResponse>))
)]
pub async fn list_conversations(State(state): State<SharedState>) -> Json<Vec<ConversationStatusResponse>> {
    let active = state.registry.active().await;
    Json(active.into_iter().map(Into::into).collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Live session status", body = ConversationStatusResponse),
        (status = 404, description = "No live session with this id")
    )
)]
pub async fn get_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationStatusResponse>, ApiError> {
    state
        .registry
        .status(&id)
        .await
        .map(|status| Json(status.into()))
        .ok_or_else(|| ApiError::NotFound(format!("No live conversation {}", id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/archive",
    tag = "conversations",
    params(ArchiveQuery),
    responses(
        (status = 200, description = "Archived conversations, newest first", body = Vec<ArchiveSummaryResponse>),
        (status = 400, description = "Limit out of range")
    )
)]
pub async fn list_archive(
    State(state): State<SharedState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<Vec<ArchiveSummaryResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ARCHIVE_LIMIT);
    if limit == 0 || limit > MAX_ARCHIVE_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_ARCHIVE_LIMIT
        )));
    }

    let summaries = ArchiveManager::new(&state.db).list(limit)?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/archive/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Full conversation snapshot with every document version"),
        (status = 404, description = "Not archived")
    )
)]
pub async fn get_archived(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let manager = ArchiveManager::new(&state.db);
    if !manager.exists(&id)? {
        return Err(ApiError::NotFound(format!("Conversation {} is not archived", id)));
    }
    let snapshot = manager.load(&id)?;
    let value = serde_json::to_value(&snapshot).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(value))
}

#[utoipa::path(
    get,
    path = "/api/v1/archive/{id}/documents/{doc_type}",
    tag = "conversations",
    params(
        ("id" = String, Path, description = "Conversation id"),
        ("doc_type" = String, Path, description = "Document type, e.g. prd or tech_spec")
    ),
    responses(
        (status = 200, description = "Every archived version, oldest first", body = Vec<DocumentVersionResponse>),
        (status = 404, description = "Not archived, or no such document")
    )
)]
pub async fn get_document_history(
    State(state): State<SharedState>,
    Path((id, doc_type)): Path<(String, String)>,
) -> Result<Json<Vec<DocumentVersionResponse>>, ApiError> {
    let manager = ArchiveManager::new(&state.db);
    if !manager.exists(&id)? {
        return Err(ApiError::NotFound(format!("Conversation {} is not archived", id)));
    }
    let history = manager.document_history(&id, &doc_type)?;
    if history.is_empty() {
        return Err(ApiError::NotFound(format!("No {} document in conversation {}", doc_type, id)));
    }
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses((status = 200, description = "Effective panel configuration", body = ConfigResponse))
)]
pub async fn get_config(State(state): State<SharedState>) -> Result<Json<ConfigResponse>, ApiError> {
    let services = state.registry.services();
    let config = serde_json::to_value(services.config.as_ref()).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(ConfigResponse {
        specialists: services
            .specialists
            .ids()
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect(),
        config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use conclave_core::panel::{PanelConfig, PanelServices, SessionRegistry};
    use conclave_core::specialists::SpecialistId;
    use conclave_core::state::{ConclaveDb, Conversation, ConversationSnapshot, ConversationType, DocumentStore};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn state() -> SharedState {
        let db = Arc::new(ConclaveDb::open_in_memory().unwrap());
        let registry =
            SessionRegistry::new(PanelServices::with_defaults(PanelConfig::default())).with_archive(Arc::clone(&db));
        Arc::new(AppState { registry, db })
    }

    #[tokio::test]
    async fn test_unknown_archive_entry_is_not_found() {
        let result = get_archived(State(state()), Path("missing".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_torn_down_session_moves_to_archive() {
        let state = state();
        let (events_tx, _events_rx) = mpsc::channel(64);
        let id = state.registry.open(ConversationType::Tool, events_tx).await;

        let Json(live) = list_conversations(State(Arc::clone(&state))).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].conversation_type, "tool");

        state.registry.teardown(&id).await.unwrap();

        let Json(archived) = list_archive(State(Arc::clone(&state)), Query(ArchiveQuery { limit: None }))
            .await
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, id);

        let Json(snapshot) = get_archived(State(Arc::clone(&state)), Path(id.clone())).await.unwrap();
        assert_eq!(snapshot["conversation"]["id"], id.as_str());
        assert!(matches!(
            get_conversation(State(state), Path(id)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_document_history_lists_archived_versions() {
        let state = state();
        let conversation = Conversation::with_id("conv-docs", ConversationType::Tool);
        let mut store = DocumentStore::new();
        store.record(Document::draft(SpecialistId::SoftwareEngineer, "tech_spec", "first"));
        store.record(Document::draft(SpecialistId::SoftwareEngineer, "tech_spec", "second"));
        let documents = store.all_versions();
        let archived_at = documents[1].created_at;
        ArchiveManager::new(&state.db)
            .save(&ConversationSnapshot {
                conversation,
                questions: vec![],
                responses: vec![],
                documents,
                last_review: None,
                archived_at,
            })
            .unwrap();

        let path = |doc: &str| Path(("conv-docs".to_string(), doc.to_string()));
        let Json(history) = get_document_history(State(Arc::clone(&state)), path("tech_spec"))
            .await
            .unwrap();
        let versions: Vec<u32> = history.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(history[1].content, "second");
        assert_eq!(history[1].owner, "software_engineer");
        assert_eq!(history[0].status, "generated");

        assert!(matches!(
            get_document_history(State(Arc::clone(&state)), path("prd")).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            get_document_history(State(state), Path(("missing".to_string(), "tech_spec".to_string()))).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_limit_is_bounded() {
        let result = list_archive(State(state()), Query(ArchiveQuery { limit: Some(0) })).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_config_lists_default_specialists() {
        let Json(response) = get_config(State(state())).await.unwrap();
        assert_eq!(response.specialists.len(), 7);
        assert_eq!(response.config["discovery_threshold"], 5);
    }
}
