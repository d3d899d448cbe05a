//! AWS client configuration shared by the Glue and DynamoDB catalogs.

use crate::io::{S3_ACCESS_KEY_ID, S3_REGION, S3_SECRET_ACCESS_KEY, S3_SESSION_TOKEN};
use crate::options::ConnectionOptions;
use crate::properties::Properties;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

pub(crate) const REGION: &[&str] = &["client.region", "region"];
pub(crate) const ACCESS_KEY_ID: &[&str] = &["client.access-key-id", "access-key-id"];
pub(crate) const SECRET_ACCESS_KEY: &[&str] = &["client.secret-access-key", "secret-access-key"];
pub(crate) const SESSION_TOKEN: &[&str] = &["client.session-token", "session-token"];

/// SDK configuration from `with_aws_config`, or built from the AWS properties
/// on top of the default credential chain.
pub(crate) async fn load_sdk_config(options: &ConnectionOptions) -> SdkConfig {
    if let Some(config) = &options.aws_config {
        debug!("Using caller-supplied AWS SDK config");
        return config.clone();
    }

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = options.aws_property(REGION) {
        loader = loader.region(Region::new(region.to_string()));
    }

    if let (Some(access_key), Some(secret_key)) = (
        options.aws_property(ACCESS_KEY_ID),
        options.aws_property(SECRET_ACCESS_KEY),
    ) {
        debug!("Using explicit AWS credentials");
        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            options.aws_property(SESSION_TOKEN).map(str::to_string),
            None,
            "lakecat-explicit-credentials",
        );
        loader = loader.credentials_provider(credentials);
    } else {
        debug!("Using default AWS credential chain");
    }

    loader.load().await
}

/// Object store properties for metadata files: explicit `s3.*` properties
/// win over the catalog's AWS region and static credentials.
pub(crate) fn io_properties(options: &ConnectionOptions, sdk_config: &SdkConfig) -> Properties {
    let mut properties = Properties::new();

    if let Some(region) = sdk_config.region() {
        properties.insert(S3_REGION.to_string(), region.to_string());
    }
    let static_keys = [
        (ACCESS_KEY_ID, S3_ACCESS_KEY_ID),
        (SECRET_ACCESS_KEY, S3_SECRET_ACCESS_KEY),
        (SESSION_TOKEN, S3_SESSION_TOKEN),
    ];
    for (keys, s3_key) in static_keys {
        if let Some(value) = options.aws_property(keys) {
            properties.insert(s3_key.to_string(), value.to_string());
        }
    }

    properties.extend(
        options
            .aws_properties
            .iter()
            .filter(|(k, _)| k.starts_with("s3."))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> ConnectionOptions {
        ConnectionOptions {
            aws_properties: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_region_and_credentials_from_properties() {
        let opts = options(&[
            ("region", "eu-central-1"),
            ("access-key-id", "AKIDEXAMPLE"),
            ("secret-access-key", "secret"),
            ("s3.endpoint", "http://localhost:9000"),
        ]);
        let sdk_config = load_sdk_config(&opts).await;
        assert_eq!(sdk_config.region().map(|r| r.as_ref()), Some("eu-central-1"));
        assert!(sdk_config.credentials_provider().is_some());

        let io = io_properties(&opts, &sdk_config);
        assert_eq!(io[S3_REGION], "eu-central-1");
        assert_eq!(io[S3_ACCESS_KEY_ID], "AKIDEXAMPLE");
        assert_eq!(io["s3.endpoint"], "http://localhost:9000");
        assert!(!io.contains_key(S3_SESSION_TOKEN));
    }

    #[tokio::test]
    async fn test_client_prefixed_keys_take_precedence() {
        let opts = options(&[("client.region", "us-west-2"), ("region", "us-east-1")]);
        let sdk_config = load_sdk_config(&opts).await;
        assert_eq!(sdk_config.region().map(|r| r.as_ref()), Some("us-west-2"));
    }

    #[test]
    fn test_explicit_s3_properties_win() {
        let opts = options(&[("region", "us-east-1"), ("s3.region", "us-west-1")]);
        let sdk_config = SdkConfig::builder()
            .region(Region::new("us-east-1"))
            .build();
        let io = io_properties(&opts, &sdk_config);
        assert_eq!(io[S3_REGION], "us-west-1");
    }
}
