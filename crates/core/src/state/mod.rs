pub mod archive;
pub mod conversation;
pub mod db;
pub mod documents;
pub mod ledger;

pub use db::ConclaveDb;

pub use archive::{ArchiveManager, ArchiveSummary, ConversationSnapshot};
pub use conversation::{Conversation, ConversationType, Message, MessageRole};
pub use documents::{Document, DocumentStatus, DocumentStore};
pub use ledger::{Question, QuestionKind, QuestionLedger, QuestionResponse};
