use super::types::{EmailObject, EmailPage};
use super::EmailStore;
use crate::aws::to_chrono;
use crate::error::{JousterError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

/// Email archive stored in an S3 bucket under a key prefix
#[derive(Clone, Debug)]
pub struct S3EmailStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3EmailStore {
    /// Create a store from shared SDK configuration
    ///
    /// Path-style addressing is forced when an endpoint override is set so
    /// MinIO and LocalStack work without DNS tricks.
    pub fn new(sdk_config: &SdkConfig, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(sdk_config.endpoint_url().is_some())
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Bucket this store reads from
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl EmailStore for S3EmailStore {
    async fn list(&self, max_keys: i32, continuation_token: Option<String>) -> Result<EmailPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .max_keys(max_keys);

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| {
            JousterError::Storage(format!(
                "Failed to list s3://{}/{}: {}",
                self.bucket,
                self.prefix,
                DisplayErrorContext(&e)
            ))
        })?;

        let emails: Vec<EmailObject> = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                if key.ends_with('/') {
                    return None;
                }
                Some(EmailObject::new(
                    key,
                    object.last_modified().and_then(to_chrono),
                    object.size().unwrap_or(0),
                ))
            })
            .collect();

        tracing::debug!(
            bucket = %self.bucket,
            count = emails.len(),
            truncated = response.is_truncated().unwrap_or(false),
            "Listed emails"
        );

        Ok(EmailPage {
            count: emails.len(),
            emails,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<Bytes>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    JousterError::Storage(format!("Failed to read s3://{}/{}: {}", self.bucket, key, e))
                })?;
                Ok(Some(data.into_bytes()))
            }
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    tracing::debug!(bucket = %self.bucket, key = %key, "Email not found");
                    Ok(None)
                } else {
                    Err(JousterError::Storage(format!(
                        "Failed to fetch s3://{}/{}: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&err)
                    ))
                    .into())
                }
            }
        }
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}
