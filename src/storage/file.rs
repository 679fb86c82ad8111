//! Session files under a `sessions/` directory tree
//!
//! Layout is `<root>/<project>/<conversationId>.json`. Older exports used
//! deeper or flatter layouts, so reads walk the whole tree and match on the
//! file name.

use super::types::{
    validate_conversation_id, ConversationSession, ListQuery, SessionPage, DEFAULT_PROJECT,
};
use super::SessionStore;
use crate::error::{JousterError, Result};
use anyhow::Context;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Session store writing one pretty-printed JSON file per session
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Open (and create if needed) a session tree rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the directory cannot be created
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .context("Failed to create sessions directory")
            .map_err(|e| JousterError::Storage(format!("{}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    /// Root of the session tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every readable session in the tree
    ///
    /// Files that fail to parse are logged and skipped.
    pub async fn load_all(&self) -> Result<Vec<ConversationSession>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan(&root))
            .await
            .map_err(|e| JousterError::Storage(format!("session scan panicked: {}", e)))?
    }

    fn path_for(&self, session: &ConversationSession) -> PathBuf {
        self.root
            .join(sanitize_project(&session.project))
            .join(format!("{}.json", session.conversation_id))
    }
}

/// Reduce a project name to a safe directory name
pub fn sanitize_project(project: &str) -> String {
    let cleaned: String = project
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        DEFAULT_PROJECT.to_string()
    } else {
        cleaned
    }
}

fn is_session_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
}

fn read_session(path: &Path) -> Result<ConversationSession> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let session = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(session)
}

fn scan(root: &Path) -> Result<Vec<ConversationSession>> {
    let mut sessions = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable path in session tree: {}", e);
                continue;
            }
        };
        if !is_session_file(&entry) {
            continue;
        }
        match read_session(entry.path()) {
            Ok(session) => sessions.push(session),
            Err(e) => tracing::warn!(path = %entry.path().display(), "Skipping session file: {:#}", e),
        }
    }
    Ok(sessions)
}

fn find_path(root: &Path, id: &str) -> Option<PathBuf> {
    let file_name = format!("{}.json", id);
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| is_session_file(e) && e.file_name().to_str() == Some(file_name.as_str()))
        .map(|e| e.into_path())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    // Unique per writer and without a `.json` extension, so scans skip it
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move session into {}", path.display()))?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| JousterError::Storage(format!("session task panicked: {}", e)))?
        .map_err(|e| {
            if e.downcast_ref::<JousterError>().is_some() {
                e
            } else {
                JousterError::Storage(format!("{:#}", e)).into()
            }
        })
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn list(&self, query: &ListQuery) -> Result<SessionPage> {
        let offset = match &query.next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                JousterError::Validation(format!("Invalid nextToken: {:?}", token))
            })?,
            None => 0,
        };

        let mut sessions = self.load_all().await?;
        if let Some(project) = &query.project {
            sessions.retain(|s| &s.project == project);
        }
        sessions.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });

        let total = sessions.len();
        let page: Vec<_> = sessions
            .iter()
            .skip(offset)
            .take(query.limit)
            .map(ConversationSession::summary_view)
            .collect();
        let end = offset.saturating_add(page.len());
        let next_token = (end < total && !page.is_empty()).then(|| end.to_string());

        Ok(SessionPage {
            count: page.len(),
            sessions: page,
            total: Some(total),
            next_token,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        validate_conversation_id(id)?;
        let root = self.root.clone();
        let id = id.to_string();
        blocking(move || match find_path(&root, &id) {
            Some(path) => read_session(&path).map(Some),
            None => Ok(None),
        })
        .await
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        session.validate()?;
        let root = self.root.clone();
        let target = self.path_for(session);
        let id = session.conversation_id.clone();
        let contents = serde_json::to_vec_pretty(session)?;

        blocking(move || {
            // A project change moves the file; drop the old copy
            if let Some(existing) = find_path(&root, &id) {
                if existing != target {
                    std::fs::remove_file(&existing)
                        .with_context(|| format!("Failed to remove {}", existing.display()))?;
                }
            }
            write_atomic(&target, &contents)
        })
        .await?;

        tracing::debug!(conversation_id = %session.conversation_id, "Saved session file");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        validate_conversation_id(id)?;
        let root = self.root.clone();
        let id = id.to_string();
        blocking(move || match find_path(&root, &id) {
            Some(path) => {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                Ok(true)
            }
            None => Ok(false),
        })
        .await
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
