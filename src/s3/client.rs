//! AWS S3 client wrapper

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;

use crate::error::BoxError;
use crate::s3::credentials::{self, CredentialResolver};

/// Files larger than this are sent as multipart uploads
pub const MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Smallest part size used for multipart uploads
pub const PART_SIZE: u64 = 8 * 1024 * 1024;

/// S3 limit on the number of parts in one multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// S3 limit on the size of a single part
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Uploads a single local file to a bucket under a key
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    /// Upload `path` to `bucket` as `key`, returning the number of bytes sent
    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<u64, BoxError>;
}

/// Builds a storage client from a credential source
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: ObjectUploader;

    async fn create_client(&self, resolver: &CredentialResolver) -> Result<Self::Client, BoxError>;
}

/// Endpoint overrides applied on top of the resolved SDK config
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    /// Custom endpoint (MinIO, LocalStack, ...)
    pub endpoint_url: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
    /// Region override; the SDK region chain is used when absent
    pub region: Option<String>,
}

/// Factory producing [`S3Client`]s
#[derive(Debug, Clone, Default)]
pub struct S3ClientFactory {
    config: S3ClientConfig,
}

impl S3ClientFactory {
    pub fn new(config: S3ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    type Client = S3Client;

    async fn create_client(&self, resolver: &CredentialResolver) -> Result<S3Client, BoxError> {
        let config_path = credentials::shared_config_path();
        let credentials_path = credentials::shared_credentials_path();
        let known = credentials::known_profiles(&config_path, &credentials_path);
        if let Some(name) = credentials::undeclared_profile(resolver, &known) {
            tracing::warn!(
                "Profile '{}' is not declared in {:?} or {:?}; uploads will likely fail to authenticate",
                name,
                config_path,
                credentials_path
            );
        }

        Ok(S3Client::new(resolver, &self.config).await)
    }
}

/// S3 client wrapper with high-level operations
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
    current_region: String,
}

impl S3Client {
    /// Create a new S3 client for the given credential source
    pub async fn new(resolver: &CredentialResolver, config: &S3ClientConfig) -> Self {
        let mut loader = resolver.config_loader();
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = Client::from_conf(s3_config);

        let current_region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());

        tracing::debug!(
            "Created S3 client using {} in region {}",
            resolver.as_str(),
            current_region
        );

        Self {
            client,
            current_region,
        }
    }

    /// Upload a file with a single PutObject request
    async fn put_file(&self, path: &Path, bucket: &str, key: &str) -> Result<(), BoxError> {
        let body = ByteStream::from_path(path).await?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        Ok(())
    }

    /// Upload a file part by part, aborting the multipart upload on failure
    async fn put_file_multipart(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
    ) -> Result<(), BoxError> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;
        let upload_id = create
            .upload_id()
            .ok_or("CreateMultipartUpload returned no upload id")?
            .to_string();

        tracing::debug!("Started multipart upload {} for {}", upload_id, key);

        let parts = match self.upload_parts(path, bucket, key, &upload_id, size).await {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        aws_sdk_s3::Error::from(abort_err)
                    );
                }
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        Ok(())
    }

    async fn upload_parts(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>, BoxError> {
        let mut parts = Vec::new();

        for (index, (offset, length)) in part_ranges(size, part_size_for(size)).enumerate() {
            let part_number = i32::try_from(index + 1)?;
            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await?;

            let response = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(|s| s.to_string()))
                    .build(),
            );
        }

        Ok(parts)
    }

    /// Create a bucket
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        Ok(())
    }

    /// Download an object to bytes
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BoxError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        let data = response.body.collect().await?;
        Ok(data.into_bytes().to_vec())
    }

    /// List every key in a bucket, following continuation tokens
    pub async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, BoxError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Get the current region
    pub fn region(&self) -> &str {
        &self.current_region
    }
}

#[async_trait]
impl ObjectUploader for S3Client {
    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<u64, BoxError> {
        let size = tokio::fs::metadata(path).await?.len();

        if size > MULTIPART_THRESHOLD {
            self.put_file_multipart(path, bucket, key, size).await?;
        } else {
            self.put_file(path, bucket, key).await?;
        }

        Ok(size)
    }
}

/// Part size for a file of `size` bytes, grown so the upload fits in [`MAX_PARTS`]
fn part_size_for(size: u64) -> u64 {
    size.div_ceil(MAX_PARTS).clamp(PART_SIZE, MAX_PART_SIZE)
}

/// Split `size` bytes into consecutive `(offset, length)` ranges of at most `part_size`
fn part_ranges(size: u64, part_size: u64) -> impl Iterator<Item = (u64, u64)> {
    (0..size)
        .step_by(part_size as usize)
        .map(move |offset| (offset, part_size.min(size - offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_ranges_exact_multiple() {
        let ranges: Vec<_> = part_ranges(30, 10).collect();
        assert_eq!(ranges, vec![(0, 10), (10, 10), (20, 10)]);
    }

    #[test]
    fn test_part_ranges_with_tail() {
        let ranges: Vec<_> = part_ranges(25, 10).collect();
        assert_eq!(ranges, vec![(0, 10), (10, 10), (20, 5)]);
        assert_eq!(ranges.iter().map(|(_, len)| len).sum::<u64>(), 25);
    }

    #[test]
    fn test_part_ranges_above_threshold() {
        let size = MULTIPART_THRESHOLD + 1;
        let ranges: Vec<_> = part_ranges(size, PART_SIZE).collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1], (PART_SIZE, 1));
    }

    #[test]
    fn test_part_size_grows_to_fit_part_limit() {
        let size = 100 * 1024 * 1024 * 1024;
        let part_size = part_size_for(size);
        assert!(part_size > PART_SIZE);

        let ranges: Vec<_> = part_ranges(size, part_size).collect();
        assert!(ranges.len() as u64 <= MAX_PARTS, "{} parts", ranges.len());
        assert_eq!(ranges.iter().map(|(_, len)| len).sum::<u64>(), size);
    }

    #[test]
    fn test_part_size_bounds() {
        assert_eq!(part_size_for(MULTIPART_THRESHOLD + 1), PART_SIZE);
        assert_eq!(part_size_for(PART_SIZE * MAX_PARTS), PART_SIZE);
        assert_eq!(part_size_for(u64::MAX), MAX_PART_SIZE);
    }

    #[tokio::test]
    async fn test_factory_builds_client_for_undeclared_profile() {
        let factory = S3ClientFactory::new(S3ClientConfig {
            endpoint_url: Some("http://127.0.0.1:9000".to_string()),
            force_path_style: true,
            region: Some("us-west-2".to_string()),
        });
        let resolver = CredentialResolver::NamedProfile("s3-mirror-no-such-profile".to_string());

        let client = factory.create_client(&resolver).await.unwrap();
        assert_eq!(client.region(), "us-west-2");
    }

    #[test]
    fn test_part_ranges_empty() {
        assert_eq!(part_ranges(0, 10).count(), 0);
    }

    #[test]
    fn test_client_config_default() {
        let config = S3ClientConfig::default();
        assert!(config.endpoint_url.is_none());
        assert!(config.region.is_none());
        assert!(!config.force_path_style);
    }

    #[tokio::test]
    async fn test_static_client_uses_region_override() {
        let resolver = CredentialResolver::Static(credentials::StaticCredentials {
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            session_token: None,
        });
        let config = S3ClientConfig {
            endpoint_url: Some("http://127.0.0.1:9000".to_string()),
            force_path_style: true,
            region: Some("eu-central-1".to_string()),
        };

        let client = S3Client::new(&resolver, &config).await;
        assert_eq!(client.region(), "eu-central-1");
    }
}
