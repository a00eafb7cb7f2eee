//! # Conversation Archive
//!
//! SQLite-backed record of conversations whose session has ended.
//! Archiving is best-effort: a failure here is logged, never surfaced to
//! the live conversation.

use super::db::ConclaveDb;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::conversation::Conversation;
use super::documents::Document;
use super::ledger::{Question, QuestionResponse};
use crate::panel::review::ReviewResult;

/// Everything worth keeping about a conversation once its session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation: Conversation,
    pub questions: Vec<Question>,
    pub responses: Vec<QuestionResponse>,
    /// Every version of every document
    pub documents: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<ReviewResult>,
    pub archived_at: DateTime<Utc>,
}

/// Listing entry for archived conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    pub id: String,
    pub conversation_type: String,
    pub phase: String,
    pub agents_consulted: u32,
    pub archived_at: DateTime<Utc>,
}

/// Reads and writes archived conversations
pub struct ArchiveManager {
    conn: Arc<Mutex<Connection>>,
}

impl ArchiveManager {
    /// Create from shared ConclaveDb connection
    pub fn new(db: &ConclaveDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Save (or replace) a snapshot and its document versions
    pub fn save(&self, snapshot: &ConversationSnapshot) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let data = serde_json::to_string(snapshot)?;
        let conversation = &snapshot.conversation;

        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO conversation_archive
            (id, conversation_type, phase, agents_consulted, data, archived_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                conversation.id,
                conversation.conversation_type.as_str(),
                conversation.phase().as_str(),
                conversation.agent_history().len() as i64,
                data,
                snapshot.archived_at.to_rfc3339(),
            ],
        )
        .context("Failed to save conversation archive")?;

        for doc in &snapshot.documents {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO document_versions
                (conversation_id, doc_type, version, status, owner, content, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    conversation.id,
                    doc.doc_type,
                    doc.version,
                    doc.status.as_str(),
                    doc.owner.as_str(),
                    doc.content,
                    doc.created_at.to_rfc3339(),
                ],
            )
            .context("Failed to save document version")?;
        }
        tx.commit()?;

        tracing::info!(
            conversation_id = %conversation.id,
            documents = snapshot.documents.len(),
            "Conversation archived"
        );
        Ok(())
    }

    /// Load a snapshot by conversation id
    pub fn load(&self, id: &str) -> Result<ConversationSnapshot> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let data: String = conn
            .query_row(
                "SELECT data FROM conversation_archive WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .with_context(|| format!("Archived conversation '{}' not found", id))?;

        Ok(serde_json::from_str(&data)?)
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversation_archive WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Most recently archived conversations first
    pub fn list(&self, limit: usize) -> Result<Vec<ArchiveSummary>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, conversation_type, phase, agents_consulted, archived_at
            FROM conversation_archive
            ORDER BY archived_at DESC
            LIMIT ?1
            "#,
        )?;

        let summaries = stmt
            .query_map(params![limit as i64], |row| {
                let archived_at: String = row.get(4)?;
                Ok(ArchiveSummary {
                    id: row.get(0)?,
                    conversation_type: row.get(1)?,
                    phase: row.get(2)?,
                    agents_consulted: row.get(3)?,
                    archived_at: parse_timestamp(&archived_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list archived conversations")?;

        Ok(summaries)
    }

    /// All archived versions of one document type, oldest first
    pub fn document_history(&self, id: &str, doc_type: &str) -> Result<Vec<Document>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT doc_type, version, status, owner, content, created_at
            FROM document_versions
            WHERE conversation_id = ?1 AND doc_type = ?2
            ORDER BY version ASC
            "#,
        )?;

        let rows = stmt.query_map(params![id, doc_type], |row| {
            let status: String = row.get(2)?;
            let owner: String = row.get(3)?;
            let created_at: String = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                status,
                owner,
                row.get::<_, String>(4)?,
                created_at,
            ))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (doc_type, version, status, owner, content, created_at) = row?;
            let owner = owner
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Corrupt archive row: {}", e))?;
            let status = status
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Corrupt archive row: {}", e))?;
            documents.push(Document {
                doc_type,
                content,
                version,
                status,
                owner,
                created_at: parse_timestamp(&created_at),
            });
        }
        Ok(documents)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::SpecialistId;
    use crate::state::{ConversationType, DocumentStore};

    fn snapshot(id: &str) -> ConversationSnapshot {
        let mut conversation = Conversation::with_id(id, ConversationType::Tool);
        conversation.record_consultation(SpecialistId::SoftwareEngineer);

        let mut store = DocumentStore::new();
        store.record(Document::draft(SpecialistId::SoftwareEngineer, "tech_spec", "v1"));
        store.record(Document::draft(SpecialistId::SoftwareEngineer, "tech_spec", "v2"));

        ConversationSnapshot {
            conversation,
            questions: vec![],
            responses: vec![],
            documents: store.all_versions(),
            last_review: None,
            archived_at: Utc::now(),
        }
    }

    #[test]
    fn test_archive_save_and_load() {
        let db = ConclaveDb::open_in_memory().unwrap();
        let manager = ArchiveManager::new(&db);

        manager.save(&snapshot("conv-001")).unwrap();

        let loaded = manager.load("conv-001").unwrap();
        assert_eq!(loaded.conversation.id, "conv-001");
        assert_eq!(loaded.conversation.agent_history().len(), 1);
        assert_eq!(loaded.documents.len(), 2);
        assert!(manager.load("missing").is_err());
        assert!(manager.exists("conv-001").unwrap());
        assert!(!manager.exists("missing").unwrap());
    }

    #[test]
    fn test_document_history_is_ordered() {
        let db = ConclaveDb::open_in_memory().unwrap();
        let manager = ArchiveManager::new(&db);
        manager.save(&snapshot("conv-002")).unwrap();

        let history = manager.document_history("conv-002", "tech_spec").unwrap();
        let versions: Vec<u32> = history.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(history[1].content, "v2");
    }

    #[test]
    fn test_list_returns_summaries() {
        let db = ConclaveDb::open_in_memory().unwrap();
        let manager = ArchiveManager::new(&db);
        manager.save(&snapshot("conv-a")).unwrap();
        manager.save(&snapshot("conv-b")).unwrap();

        let listed = manager.list(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.conversation_type == "tool"));
        assert_eq!(manager.list(1).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_document_status_is_a_corrupt_row() {
        let db = ConclaveDb::open_in_memory().unwrap();
        let manager = ArchiveManager::new(&db);
        manager.save(&snapshot("conv-003")).unwrap();

        db.connection()
            .lock()
            .unwrap()
            .execute(
                "UPDATE document_versions SET status = 'lost' WHERE conversation_id = 'conv-003'",
                [],
            )
            .unwrap();

        let err = manager.document_history("conv-003", "tech_spec").unwrap_err();
        assert!(err.to_string().contains("Corrupt archive row"));
    }
}
