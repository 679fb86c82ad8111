//! In-memory session store
//!
//! Stands in for DynamoDB when exercising the mirror logic. Can be told to
//! fail every call to simulate an unreachable table.

use super::types::{ConversationSession, ListQuery, SessionPage};
use super::SessionStore;
use crate::error::{JousterError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Session store backed by a `BTreeMap`
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<BTreeMap<String, ConversationSession>>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ConversationSession>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(JousterError::Storage("memory store is unavailable".to_string()).into());
        }
        self.sessions
            .lock()
            .map_err(|_| JousterError::Storage("memory store lock poisoned".to_string()).into())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list(&self, query: &ListQuery) -> Result<SessionPage> {
        let sessions = self.lock()?;
        let matching: Vec<_> = sessions
            .values()
            .filter(|s| query.project.as_ref().map_or(true, |p| &s.project == p))
            .filter(|s| match &query.next_token {
                Some(after) => s.conversation_id.as_str() > after.as_str(),
                None => true,
            })
            .collect();

        let page: Vec<_> = matching
            .iter()
            .take(query.limit)
            .map(|s| s.summary_view())
            .collect();
        let next_token = if matching.len() > page.len() {
            page.last().map(|s| s.conversation_id.clone())
        } else {
            None
        };

        Ok(SessionPage {
            count: page.len(),
            sessions: page,
            total: None,
            next_token,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        self.lock()?
            .insert(session.conversation_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
