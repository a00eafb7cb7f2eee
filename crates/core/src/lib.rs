//! # Conclave Core
//!
//! A panel of specialists that interviews a user about an idea, feature or
//! tool and drafts the planning documents for it.
//!
//! ## Architecture
//!
//! - `panel/` - Routing, phase machine, document trigger, review gate, sessions
//! - `specialists/` - The specialist trait, registry and template specialists
//! - `state/` - Conversation, question ledger, documents and the SQLite archive
//! - `models` - LLM provider selection handed to specialists
//! - `errors` - Domain error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conclave_core::panel::{InboundEvent, PanelConfig, PanelServices, SessionRegistry};
//! use conclave_core::state::ConversationType;
//!
//! let registry = SessionRegistry::new(PanelServices::with_defaults(PanelConfig::default()));
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let id = registry.open(ConversationType::Idea, tx).await;
//! registry.dispatch(&id, InboundEvent::user_message("A habit tracker for teams")).await?;
//! ```

pub mod errors;
pub mod models;
pub mod panel;
pub mod specialists;
pub mod state;

pub use errors::{PanelError, PanelResult};
