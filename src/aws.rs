//! Shared AWS SDK configuration
//!
//! Credentials come from the default provider chain (environment, profile,
//! instance role). Region and an optional endpoint override come from
//! [`AwsConfig`].

use crate::config::AwsConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_types::region::Region;

/// Load the SDK configuration shared by the S3 and DynamoDB clients
pub async fn load_sdk_config(cfg: &AwsConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));

    if let Some(endpoint) = &cfg.endpoint_url {
        tracing::info!(endpoint = %endpoint, "Using AWS endpoint override");
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Convert an SDK timestamp into a chrono UTC timestamp
pub fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chrono() {
        let dt = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&dt).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
