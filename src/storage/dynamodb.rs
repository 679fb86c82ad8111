//! DynamoDB mirror for conversation sessions
//!
//! One item per session, keyed by `conversationId`. Scalar fields are
//! stored as string attributes; `messages` is stored as a JSON string so
//! items written by older tooling stay readable.

use super::types::{ConversationMessage, ConversationSession, ListQuery, SessionPage, DEFAULT_PROJECT};
use super::SessionStore;
use crate::error::{JousterError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

const KEY_ATTR: &str = "conversationId";

type Item = HashMap<String, AttributeValue>;

/// Session store backed by a DynamoDB table
#[derive(Clone, Debug)]
pub struct DynamoSessionStore {
    client: Client,
    table: String,
}

impl DynamoSessionStore {
    /// Create a store for `table`
    ///
    /// `endpoint` overrides the shared SDK endpoint (DynamoDB Local).
    pub fn new(sdk_config: &SdkConfig, table: impl Into<String>, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            table: table.into(),
        }
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    fn storage_error<E>(&self, op: &str, err: E) -> anyhow::Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        JousterError::Storage(format!(
            "DynamoDB {} on {} failed: {}",
            op,
            self.table,
            DisplayErrorContext(err)
        ))
        .into()
    }
}

/// Convert a session into a DynamoDB item
///
/// # Errors
///
/// Returns an error if the messages cannot be serialized
pub fn to_item(session: &ConversationSession) -> Result<Item> {
    let mut item = Item::new();
    item.insert(
        KEY_ATTR.to_string(),
        AttributeValue::S(session.conversation_id.clone()),
    );
    item.insert("title".to_string(), AttributeValue::S(session.title.clone()));
    item.insert(
        "project".to_string(),
        AttributeValue::S(session.project.clone()),
    );
    item.insert(
        "startTime".to_string(),
        AttributeValue::S(session.start_time.clone()),
    );
    if let Some(end) = &session.end_time {
        item.insert("endTime".to_string(), AttributeValue::S(end.clone()));
    }
    if let Some(summary) = &session.summary {
        item.insert("summary".to_string(), AttributeValue::S(summary.clone()));
    }
    item.insert(
        "messages".to_string(),
        AttributeValue::S(serde_json::to_string(&session.messages)?),
    );
    item.insert(
        "messageCount".to_string(),
        AttributeValue::N(session.messages.len().to_string()),
    );
    Ok(item)
}

fn string_attr(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

/// Convert a DynamoDB item back into a session
///
/// # Errors
///
/// Returns a `Storage` error when the key is missing or `messages` is not
/// valid JSON
pub fn from_item(item: &Item) -> Result<ConversationSession> {
    let conversation_id = string_attr(item, KEY_ATTR)
        .ok_or_else(|| JousterError::Storage(format!("item is missing {}", KEY_ATTR)))?;

    let messages: Vec<ConversationMessage> = match string_attr(item, "messages") {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            JousterError::Storage(format!("item {} has invalid messages: {}", conversation_id, e))
        })?,
        None => Vec::new(),
    };

    Ok(ConversationSession {
        title: string_attr(item, "title").unwrap_or_default(),
        project: string_attr(item, "project").unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        start_time: string_attr(item, "startTime").unwrap_or_default(),
        end_time: string_attr(item, "endTime"),
        summary: string_attr(item, "summary"),
        messages,
        conversation_id,
    })
}

fn key(id: &str) -> (String, AttributeValue) {
    (KEY_ATTR.to_string(), AttributeValue::S(id.to_string()))
}

#[async_trait]
impl SessionStore for DynamoSessionStore {
    async fn list(&self, query: &ListQuery) -> Result<SessionPage> {
        let limit = i32::try_from(query.limit).unwrap_or(i32::MAX).max(1);
        let mut request = self.client.scan().table_name(&self.table).limit(limit);

        if let Some(token) = &query.next_token {
            let (k, v) = key(token);
            request = request.exclusive_start_key(k, v);
        }

        if let Some(project) = &query.project {
            request = request
                .filter_expression("#p = :p")
                .expression_attribute_names("#p", "project")
                .expression_attribute_values(":p", AttributeValue::S(project.clone()));
        }

        let output = request
            .send()
            .await
            .map_err(|e| self.storage_error("Scan", e))?;

        let mut sessions = Vec::new();
        for item in output.items() {
            match from_item(item) {
                Ok(session) => sessions.push(session.summary_view()),
                Err(e) => tracing::warn!(table = %self.table, "Skipping unreadable item: {}", e),
            }
        }

        let next_token = output
            .last_evaluated_key()
            .and_then(|k| k.get(KEY_ATTR))
            .and_then(|v| v.as_s().ok())
            .cloned();

        Ok(SessionPage {
            count: sessions.len(),
            sessions,
            total: None,
            next_token,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        let (k, v) = key(id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(k, v)
            .send()
            .await
            .map_err(|e| self.storage_error("GetItem", e))?;

        output.item().map(from_item).transpose()
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        let item = to_item(session)?;
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| self.storage_error("PutItem", e))?;

        tracing::debug!(table = %self.table, conversation_id = %session.conversation_id, "Mirrored session");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let (k, v) = key(id);
        let output = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key(k, v)
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| self.storage_error("DeleteItem", e))?;

        Ok(output.attributes().is_some())
    }

    fn name(&self) -> &'static str {
        "dynamodb"
    }
}
