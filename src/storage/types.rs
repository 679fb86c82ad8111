use crate::error::{JousterError, Result};
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum title length in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// Project used when a session does not name one
pub const DEFAULT_PROJECT: &str = "general";

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_regex() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("id pattern is valid"))
}

/// Current time as an RFC-3339 string with millisecond precision
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side
    User,
    /// The model side
    Assistant,
    /// Instructions injected by tooling
    System,
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// RFC-3339 timestamp
    #[serde(default = "now_rfc3339")]
    pub timestamp: String,
}

impl ConversationMessage {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_rfc3339(),
        }
    }
}

/// A stored conversation
///
/// Sessions only ever grow: messages are appended and `end_time` moves
/// forward. There is no versioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    /// Unique identifier
    pub conversation_id: String,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    /// Project the conversation belongs to
    #[serde(default = "default_project")]
    pub project: String,
    /// RFC-3339 start time
    pub start_time: String,
    /// RFC-3339 time of the last message
    #[serde(default)]
    pub end_time: Option<String>,
    /// Messages in order
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Optional free-text summary
    #[serde(default)]
    pub summary: Option<String>,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

impl ConversationSession {
    /// Check identifiers and field limits
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the offending field
    pub fn validate(&self) -> Result<()> {
        validate_conversation_id(&self.conversation_id)?;

        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(JousterError::Validation(format!(
                "title exceeds {} characters",
                MAX_TITLE_CHARS
            ))
            .into());
        }

        for (i, message) in self.messages.iter().enumerate() {
            validate_message(message).map_err(|e| {
                JousterError::Validation(format!("messages[{}]: {}", i, root_message(&e)))
            })?;
        }

        Ok(())
    }

    /// Append messages and move `end_time` to the newest timestamp
    pub fn append(&mut self, messages: Vec<ConversationMessage>) {
        if let Some(last) = messages.last() {
            self.end_time = Some(last.timestamp.clone());
        }
        self.messages.extend(messages);
    }

    /// Listing view of this session
    pub fn summary_view(&self) -> SessionSummary {
        SessionSummary {
            conversation_id: self.conversation_id.clone(),
            title: self.title.clone(),
            project: self.project.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            summary: self.summary.clone(),
            message_count: self.messages.len(),
        }
    }
}

fn root_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<JousterError>() {
        Some(JousterError::Validation(msg)) => msg.clone(),
        _ => err.to_string(),
    }
}

/// Check a conversation id
///
/// # Errors
///
/// Returns a `Validation` error unless the id is 1-128 characters of
/// `[A-Za-z0-9_-]`
pub fn validate_conversation_id(id: &str) -> Result<()> {
    if id_regex().is_match(id) {
        Ok(())
    } else {
        Err(JousterError::Validation(format!("Invalid conversation id: {:?}", id)).into())
    }
}

/// Check a single message
///
/// # Errors
///
/// Returns a `Validation` error when the content is blank
pub fn validate_message(message: &ConversationMessage) -> Result<()> {
    if message.content.trim().is_empty() {
        return Err(JousterError::Validation("content cannot be empty".to_string()).into());
    }
    Ok(())
}

/// Listing view of a session without its messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Unique identifier
    pub conversation_id: String,
    /// Human-readable title
    pub title: String,
    /// Project the conversation belongs to
    pub project: String,
    /// RFC-3339 start time
    pub start_time: String,
    /// RFC-3339 time of the last message
    pub end_time: Option<String>,
    /// Optional free-text summary
    pub summary: Option<String>,
    /// Number of messages in the session
    pub message_count: usize,
}

/// Filters and cursor for a session listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only sessions from this project
    pub project: Option<String>,
    /// Page size
    pub limit: usize,
    /// Cursor from a previous page
    pub next_token: Option<String>,
}

/// One page of sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPage {
    /// Sessions on this page
    pub sessions: Vec<SessionSummary>,
    /// Number of sessions on this page
    pub count: usize,
    /// Total matching sessions, when the backend knows it
    pub total: Option<usize>,
    /// Cursor for the next page
    pub next_token: Option<String>,
}

/// Outcome of copying local sessions into DynamoDB
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Sessions written
    pub migrated: usize,
    /// Sessions that failed
    pub failed: usize,
    /// One entry per failure: `"<id>: <reason>"`
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ConversationSession {
        ConversationSession {
            conversation_id: "abc-123".to_string(),
            title: "Debugging".to_string(),
            project: "jouster".to_string(),
            start_time: "2024-05-01T10:00:00.000Z".to_string(),
            end_time: None,
            messages: vec![],
            summary: None,
        }
    }

    #[test]
    fn test_session_json_uses_camel_case() {
        let json = serde_json::to_value(session()).unwrap();
        assert_eq!(json["conversationId"], "abc-123");
        assert_eq!(json["startTime"], "2024-05-01T10:00:00.000Z");
        assert!(json["endTime"].is_null());
    }

    #[test]
    fn test_session_defaults_on_deserialize() {
        let s: ConversationSession = serde_json::from_str(
            r#"{"conversationId":"x","startTime":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(s.project, DEFAULT_PROJECT);
        assert!(s.messages.is_empty());
        assert_eq!(s.title, "");
    }

    #[test]
    fn test_message_role_serialization() {
        let m = ConversationMessage::new(Role::Assistant, "hi");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(serde_json::from_str::<ConversationMessage>(r#"{"role":"robot","content":"x"}"#)
            .is_err());
    }

    #[test]
    fn test_validate_conversation_id() {
        assert!(validate_conversation_id("abc_DEF-123").is_ok());
        assert!(validate_conversation_id("").is_err());
        assert!(validate_conversation_id("../etc").is_err());
        assert!(validate_conversation_id("has space").is_err());
        assert!(validate_conversation_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_rejects_long_title() {
        let mut s = session();
        s.title = "t".repeat(MAX_TITLE_CHARS + 1);
        assert!(s.validate().is_err());
        s.title = "t".repeat(MAX_TITLE_CHARS);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_message() {
        let mut s = session();
        s.messages.push(ConversationMessage::new(Role::User, "   "));
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("messages[0]"));
    }

    #[test]
    fn test_append_moves_end_time() {
        let mut s = session();
        let mut m = ConversationMessage::new(Role::User, "hello");
        m.timestamp = "2024-05-01T10:05:00.000Z".to_string();
        s.append(vec![m]);
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.end_time.as_deref(), Some("2024-05-01T10:05:00.000Z"));

        s.append(vec![]);
        assert_eq!(s.end_time.as_deref(), Some("2024-05-01T10:05:00.000Z"));
    }

    #[test]
    fn test_summary_view_counts_messages() {
        let mut s = session();
        s.append(vec![
            ConversationMessage::new(Role::User, "a"),
            ConversationMessage::new(Role::Assistant, "b"),
        ]);
        let view = s.summary_view();
        assert_eq!(view.message_count, 2);
        assert_eq!(view.conversation_id, "abc-123");
    }
}
