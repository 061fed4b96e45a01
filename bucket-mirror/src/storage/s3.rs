//! S3-compatible implementation of [`ObjectStore`] on top of `aws-sdk-s3`.
//!
//! Timeouts and connection handling are inherited from the SDK client.

use super::{KeyPage, ObjectStore, StorageError, StorageOutcome};
use crate::config::{Credentials, RemoteConfig};
use crate::utils::{MirrorError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials as SdkCredentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::fs::File;

const CREDENTIALS_PROVIDER: &str = "bucket-mirror";

pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from static credentials and the configured endpoint.
    pub async fn connect(credentials: &Credentials, remote: &RemoteConfig) -> Result<Self> {
        if credentials.application_key_id.is_empty() || credentials.application_key.is_empty() {
            return Err(MirrorError::Storage("credentials must not be empty".into()));
        }

        let static_credentials = SdkCredentials::new(
            &credentials.application_key_id,
            &credentials.application_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(remote.region.clone()))
            .credentials_provider(static_credentials)
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(remote.force_path_style);

        if let Some(endpoint) = remote.endpoint.as_deref().filter(|e| !e.is_empty()) {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(MirrorError::Storage(format!(
                    "endpoint {} must start with http:// or https://",
                    endpoint
                )));
            }
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            region = %remote.region,
            endpoint = remote.endpoint.as_deref().unwrap_or("default"),
            "Object storage client configured"
        );

        Ok(Self::from_client(Client::from_conf(builder.build())))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn probe_bucket(&self, bucket: &str) -> StorageOutcome<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => StorageOutcome::Found(()),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                StorageOutcome::NotFound
            }
            Err(err) => StorageOutcome::TransportError(DisplayErrorContext(&err).to_string()),
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageOutcome<KeyPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        match request.send().await {
            Ok(output) => {
                let keys = output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string))
                    .collect();

                // Some S3-compatible services omit is_truncated; trust the token.
                let continuation = match output.is_truncated() {
                    Some(false) => None,
                    _ => output.next_continuation_token().map(str::to_string),
                };

                StorageOutcome::Found(KeyPage { keys, continuation })
            }
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_bucket()) => {
                StorageOutcome::NotFound
            }
            Err(err) => StorageOutcome::TransportError(DisplayErrorContext(&err).to_string()),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: File) -> std::result::Result<(), StorageError> {
        let stream = ByteStream::read_from().file(body).build()
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .send()
            .await
            .map_err(|e| StorageError::Transport(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
