//! Test utilities for Jouster
//!
//! This module provides common test utilities including temporary directory
//! management, sample sessions and emails, and assertion helpers.

use crate::config::Config;
use crate::storage::{ConversationMessage, ConversationSession, Role};
use std::path::PathBuf;
use tempfile::TempDir;

/// A small multipart message with plain and HTML alternatives
pub const SAMPLE_EMAIL: &str = "From: \"Wade Watts\" <wade@example.com>\r\n\
To: art3mis@example.com, \"Aech, H.\" <aech@example.com>\r\n\
Subject: =?UTF-8?B?SGVsbG8sIE9BU0lT?=\r\n\
Date: Mon, 15 Jan 2024 10:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
See you at the arcade.\r\n\
--sep\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>See you at the arcade.</p>\r\n\
--sep--\r\n";

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Build a session with one user message
pub fn sample_session(id: &str, project: &str, start_time: &str) -> ConversationSession {
    let mut message = ConversationMessage::new(Role::User, format!("first message in {}", id));
    message.timestamp = start_time.to_string();
    ConversationSession {
        conversation_id: id.to_string(),
        title: format!("Session {}", id),
        project: project.to_string(),
        start_time: start_time.to_string(),
        end_time: Some(start_time.to_string()),
        messages: vec![message],
        summary: None,
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T: std::fmt::Debug>(result: crate::error::Result<T>, expected: &str) {
    match result {
        Ok(v) => panic!("Expected error containing '{}' but got Ok({:?})", expected, v),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration rooted in `dir`
///
/// Sessions live under `dir`; every external service is unconfigured.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.history.sessions_dir = dir.path().join("sessions");
    config.history.dynamodb_table = None;
    config.emails.bucket = None;
    config.lastfm.api_key = None;
    config.instagram.access_token = None;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JousterError;

    #[test]
    fn test_create_test_file_in_subdirectory() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "nested/test.txt", "content");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: crate::error::Result<()> =
            Err(JousterError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_sample_session_is_valid() {
        let session = sample_session("abc", "general", "2024-01-01T00:00:00.000Z");
        assert!(session.validate().is_ok());
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_test_config_is_valid() {
        let dir = temp_dir();
        let config = test_config(&dir);
        assert!(config.validate().is_ok());
        assert!(config.history.sessions_dir.starts_with(dir.path()));
    }
}
