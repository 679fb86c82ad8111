//! Conversation history service
//!
//! The local file tree is the source of truth. When a DynamoDB table is
//! configured every write is mirrored to it; mirror failures are logged and
//! never fail the caller.

use crate::error::{JousterError, Result};
use crate::storage::{
    now_rfc3339, validate_conversation_id, ConversationMessage, ConversationSession,
    FileSessionStore, ListQuery, MigrationReport, SessionPage, SessionStore,
};
use crate::storage::types::DEFAULT_PROJECT;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default page size for session listings
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Largest page size a caller may request
pub const MAX_LIST_LIMIT: usize = 100;

/// Request body for creating a session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    /// Explicit id; a UUID is generated when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    /// Project name, `general` when absent
    #[serde(default)]
    pub project: Option<String>,
    /// Start time, now when absent
    #[serde(default)]
    pub start_time: Option<String>,
    /// Initial messages
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Optional summary
    #[serde(default)]
    pub summary: Option<String>,
}

/// Where a listing reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListSource {
    /// The local session tree
    #[default]
    Local,
    /// The DynamoDB mirror
    #[serde(alias = "mirror")]
    Dynamodb,
}

/// Clamp a requested page size into `1..=MAX_LIST_LIMIT`
pub fn clamp_list_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// File-backed history with an optional mirror
///
/// Mutations run one at a time so that read-modify-write updates of the
/// same session never interleave.
pub struct HistoryService {
    files: FileSessionStore,
    mirror: Option<Arc<dyn SessionStore>>,
    writes: Mutex<()>,
}

impl HistoryService {
    /// Create a service over `files`, mirroring to `mirror` when given
    pub fn new(files: FileSessionStore, mirror: Option<Arc<dyn SessionStore>>) -> Self {
        Self {
            files,
            mirror,
            writes: Mutex::new(()),
        }
    }

    /// Whether a mirror is attached
    pub fn has_mirror(&self) -> bool {
        self.mirror.is_some()
    }

    /// The local file store
    pub fn files(&self) -> &FileSessionStore {
        &self.files
    }

    /// Create a new session
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for bad input or an id that already
    /// exists, or a `Storage` error if the file cannot be written
    pub async fn create(&self, new: NewSession) -> Result<ConversationSession> {
        let conversation_id = match new.conversation_id {
            Some(id) => {
                validate_conversation_id(&id)?;
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };

        let _guard = self.writes.lock().await;
        if self.get(&conversation_id).await?.is_some() {
            return Err(JousterError::Validation(format!(
                "Conversation {} already exists",
                conversation_id
            ))
            .into());
        }

        let mut session = ConversationSession {
            conversation_id,
            title: new.title,
            project: new
                .project
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            start_time: new.start_time.unwrap_or_else(now_rfc3339),
            end_time: None,
            messages: Vec::new(),
            summary: new.summary,
        };
        session.append(new.messages);
        session.validate()?;

        self.save(&session).await?;
        tracing::info!(
            conversation_id = %session.conversation_id,
            project = %session.project,
            "Created conversation"
        );
        Ok(session)
    }

    /// Append messages to an existing session
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the session does not exist anywhere, or a
    /// `Validation` error when a message is invalid
    pub async fn append_messages(
        &self,
        id: &str,
        messages: Vec<ConversationMessage>,
    ) -> Result<ConversationSession> {
        if messages.is_empty() {
            return Err(JousterError::Validation("messages cannot be empty".to_string()).into());
        }

        let _guard = self.writes.lock().await;
        let mut session = self
            .get(id)
            .await?
            .ok_or_else(|| JousterError::NotFound(format!("Conversation {}", id)))?;

        session.append(messages);
        session.validate()?;
        self.save(&session).await?;

        tracing::debug!(
            conversation_id = %id,
            message_count = session.messages.len(),
            "Appended messages"
        );
        Ok(session)
    }

    /// Load a session, falling back to the mirror when it is not on disk
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for a malformed id or a `Storage` error
    /// if the local tree cannot be read
    pub async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        validate_conversation_id(id)?;
        if let Some(session) = self.files.get(id).await? {
            return Ok(Some(session));
        }

        let Some(mirror) = &self.mirror else {
            return Ok(None);
        };
        match mirror.get(id).await {
            Ok(found) => {
                if found.is_some() {
                    tracing::debug!(conversation_id = %id, backend = mirror.name(), "Served session from mirror");
                }
                Ok(found)
            }
            Err(e) => {
                tracing::warn!(conversation_id = %id, backend = mirror.name(), "Mirror read failed: {:#}", e);
                Ok(None)
            }
        }
    }

    /// List sessions from the local tree or the mirror
    ///
    /// Mirror listings page by the last evaluated `conversationId` and do
    /// not report a total.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for a malformed `nextToken`,
    /// `NotConfigured` when the mirror is requested but absent, or the
    /// mirror's own error
    pub async fn list(&self, query: &ListQuery, source: ListSource) -> Result<SessionPage> {
        let query = ListQuery {
            limit: query.limit.clamp(1, MAX_LIST_LIMIT),
            ..query.clone()
        };
        match source {
            ListSource::Local => self.files.list(&query).await,
            ListSource::Dynamodb => {
                let mirror = self
                    .mirror
                    .as_ref()
                    .ok_or_else(|| JousterError::NotConfigured("DynamoDB table".to_string()))?;
                tracing::debug!(backend = mirror.name(), limit = query.limit, "Listing sessions from mirror");
                mirror.list(&query).await
            }
        }
    }

    /// Delete a session from the local tree and the mirror
    ///
    /// Returns whether the session existed in either place.
    ///
    /// # Errors
    ///
    /// Returns an error if the local file cannot be removed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        validate_conversation_id(id)?;
        let _guard = self.writes.lock().await;
        let local = self.files.delete(id).await?;

        let remote = match &self.mirror {
            Some(mirror) => match mirror.delete(id).await {
                Ok(existed) => existed,
                Err(e) => {
                    tracing::warn!(conversation_id = %id, backend = mirror.name(), "Mirror delete failed: {:#}", e);
                    false
                }
            },
            None => false,
        };

        if local || remote {
            tracing::info!(conversation_id = %id, "Deleted conversation");
        }
        Ok(local || remote)
    }

    /// Copy every local session into the mirror
    ///
    /// With `dry_run` nothing is written; the report counts what would be
    /// migrated.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when no mirror is attached, or a `Storage`
    /// error if the local tree cannot be scanned. Individual write failures
    /// are collected in the report.
    pub async fn migrate(&self, dry_run: bool) -> Result<MigrationReport> {
        let mirror = self
            .mirror
            .as_ref()
            .ok_or_else(|| JousterError::NotConfigured("DynamoDB table".to_string()))?;

        let sessions = self.files.load_all().await?;
        let mut report = MigrationReport::default();

        for session in sessions {
            if dry_run {
                report.migrated += 1;
                continue;
            }
            match mirror.put(&session).await {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("{}: {:#}", session.conversation_id, e));
                }
            }
        }

        tracing::info!(
            migrated = report.migrated,
            failed = report.failed,
            dry_run,
            backend = mirror.name(),
            "Migration finished"
        );
        Ok(report)
    }

    async fn save(&self, session: &ConversationSession) -> Result<()> {
        self.files.put(session).await?;
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.put(session).await {
                tracing::warn!(
                    conversation_id = %session.conversation_id,
                    backend = mirror.name(),
                    "Mirror write failed: {:#}",
                    e
                );
            }
        }
        Ok(())
    }
}
