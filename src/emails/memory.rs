//! In-memory email archive
//!
//! Serves a fixed set of messages. Used for local development without AWS
//! credentials and as the store behind the HTTP tests.

use super::types::{EmailObject, EmailPage};
use super::EmailStore;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Email store holding messages in a sorted map
///
/// Continuation tokens are the key of the last email on the previous page,
/// mirroring how S3 hands back an opaque cursor.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmailStore {
    prefix: String,
    messages: BTreeMap<String, (Bytes, Option<DateTime<Utc>>)>,
}

impl MemoryEmailStore {
    /// Create an empty store for `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            messages: BTreeMap::new(),
        }
    }

    /// Add a message under `key`
    pub fn with_message(mut self, key: impl Into<String>, raw: impl Into<Bytes>) -> Self {
        self.messages
            .insert(key.into(), (raw.into(), Some(Utc::now())));
        self
    }
}

#[async_trait]
impl EmailStore for MemoryEmailStore {
    async fn list(&self, max_keys: i32, continuation_token: Option<String>) -> Result<EmailPage> {
        let max_keys = usize::try_from(max_keys.max(1)).unwrap_or(1);

        let mut remaining = self
            .messages
            .iter()
            .filter(|(key, _)| key.starts_with(&self.prefix) && !key.ends_with('/'))
            .filter(|(key, _)| match &continuation_token {
                Some(after) => key.as_str() > after.as_str(),
                None => true,
            })
            .peekable();

        let mut emails = Vec::new();
        while emails.len() < max_keys {
            match remaining.next() {
                Some((key, (raw, modified))) => {
                    emails.push(EmailObject::new(key.clone(), *modified, raw.len() as i64))
                }
                None => break,
            }
        }

        let is_truncated = remaining.peek().is_some();
        let next_continuation_token = if is_truncated {
            emails.last().map(|e| e.key.clone())
        } else {
            None
        };

        Ok(EmailPage {
            count: emails.len(),
            emails,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.messages.get(key).map(|(raw, _)| raw.clone()))
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}
