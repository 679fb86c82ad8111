//! Email archive backed by S3
//!
//! Raw `.eml` objects live under a key prefix in one bucket. The archive is
//! read-only: listing, fetching raw bytes, and parsing on demand. Nothing is
//! cached locally.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod mime;
pub mod s3;
pub mod types;

pub use memory::MemoryEmailStore;
pub use mime::parse_email;
pub use s3::S3EmailStore;
pub use types::{EmailObject, EmailPage, ParsedEmail};

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: i32 = 50;

/// Read access to an email archive
#[async_trait]
pub trait EmailStore: Send + Sync {
    /// List one page of emails
    ///
    /// `continuation_token` is the opaque cursor from a previous page.
    async fn list(&self, max_keys: i32, continuation_token: Option<String>) -> Result<EmailPage>;

    /// Fetch the raw bytes of one email, `None` if the key does not exist
    async fn fetch(&self, key: &str) -> Result<Option<Bytes>>;

    /// Key prefix every email in this store lives under
    fn prefix(&self) -> &str;
}

/// Clamp a requested page size into `1..=max`
pub fn clamp_page_size(requested: Option<i32>, max: i32) -> i32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max.max(1))
}
