//! # Panel
//!
//! Conversation orchestration for the specialist panel.
//!
//! ## Flow
//!
//! ```text
//! discovery ──► definition ──► review ──► completed
//!                    ▲            │
//!                    └────────────┘ (needs revision)
//! ```
//!
//! The router picks a specialist, the trigger decides when its documents
//! can be generated, and the review gate is the only way to `completed`.

pub mod config;
pub mod context;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod review;
pub mod router;
pub mod session;
pub mod sessions;
pub mod trigger;

pub use config::PanelConfig;
pub use context::ConversationContext;
pub use events::{DocumentSummary, InboundEvent, PanelEvent, ThinkingStatus};
pub use orchestrator::{Orchestrator, PanelServices};
pub use phase::{Phase, Transition};
pub use review::{Approval, ReviewGate, ReviewOutcome, ReviewResult, ReviewStatus};
pub use router::Route;
pub use session::{spawn_session, SessionHandle, SessionStatus};
pub use sessions::SessionRegistry;
pub use trigger::{DocumentTrigger, TriggerDecision};
