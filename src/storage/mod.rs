//! Conversation session storage
//!
//! Sessions are kept as JSON files in a directory tree, with an optional
//! DynamoDB table acting as a mirror. Both sit behind [`SessionStore`] so
//! the history service can treat them the same way.

use crate::error::Result;
use async_trait::async_trait;

pub mod dynamodb;
pub mod file;
pub mod memory;
pub mod types;

pub use dynamodb::DynamoSessionStore;
pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use types::{
    now_rfc3339, validate_conversation_id, ConversationMessage, ConversationSession, ListQuery,
    MigrationReport, Role, SessionPage, SessionSummary,
};

/// Persistent home for conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// List sessions matching `query`, newest first where the backend can order
    async fn list(&self, query: &ListQuery) -> Result<SessionPage>;

    /// Load one session
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>>;

    /// Create or replace a session
    async fn put(&self, session: &ConversationSession) -> Result<()>;

    /// Remove a session, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;
}
