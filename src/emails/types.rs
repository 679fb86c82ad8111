use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One object from an S3 email listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailObject {
    /// Full S3 object key
    pub key: String,
    /// When S3 last saw the object change
    pub last_modified: Option<DateTime<Utc>>,
    /// Object size in bytes
    pub size: i64,
    /// Final `/`-separated segment of the key
    pub display_name: String,
}

impl EmailObject {
    /// Build an entry, deriving `display_name` from the key
    pub fn new(key: impl Into<String>, last_modified: Option<DateTime<Utc>>, size: i64) -> Self {
        let key = key.into();
        let display_name = display_name(&key).to_string();
        Self {
            key,
            last_modified,
            size,
            display_name,
        }
    }
}

/// Last path segment of an object key
pub fn display_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// One page of an email listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPage {
    /// Emails on this page
    pub emails: Vec<EmailObject>,
    /// Number of emails on this page
    pub count: usize,
    /// Whether S3 has more results
    pub is_truncated: bool,
    /// S3 continuation token for the next page, passed through unchanged
    pub next_continuation_token: Option<String>,
}

/// An email decoded from its raw MIME text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEmail {
    /// Decoded `Subject`
    pub subject: String,
    /// Decoded `From`
    pub from: String,
    /// Bare address extracted from `from`, when it is a valid address
    pub from_address: Option<String>,
    /// Decoded `To` recipients
    pub to: Vec<String>,
    /// Decoded `Cc` recipients
    pub cc: Vec<String>,
    /// Raw `Date` header
    pub date: String,
    /// Selected body part, transfer-decoded
    pub body: String,
    /// Content type of the selected body part
    pub content_type: String,
    /// All headers, lower-cased names
    pub headers: BTreeMap<String, String>,
}
