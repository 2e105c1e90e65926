use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::env;

use crate::{
    once_stream, BlobError, BlobInfo, BlobKey, BlobResult, BlobStore, ByteStream, GetResult,
    ObjectHead, PutResult,
};

/// S3-compatible store configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: String,
    pub bucket: String,
    /// Base of the public locator; defaults to `{endpoint_url}/{bucket}`
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Read `GALLERY_S3_*` environment variables
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            region: get_env("GALLERY_S3_REGION")?,
            access_key_id: get_env("GALLERY_S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("GALLERY_S3_SECRET_ACCESS_KEY")?,
            endpoint_url: get_env("GALLERY_S3_ENDPOINT_URL")?,
            bucket: get_env("GALLERY_S3_BUCKET")?,
            public_base_url: env::var("GALLERY_S3_PUBLIC_BASE_URL").ok(),
        })
    }

    fn locator_base(&self) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/{}", self.endpoint_url.trim_end_matches('/'), self.bucket),
        }
    }
}

/// Blob store backed by any S3-compatible service (AWS, MinIO, RustFS, R2)
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
    locator_base: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let locator_base = config.locator_base();
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self {
            client,
            bucket,
            locator_base,
        }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "gallery",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    async fn collect_stream(stream: &mut ByteStream) -> BlobResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let data = Self::collect_stream(&mut stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(|err| {
            let precondition_failed = err
                .raw_response()
                .map_or(false, |raw| raw.status().as_u16() == 412);
            if precondition_failed {
                BlobError::already_exists(key)
            } else {
                Self::map_aws_error(err)
            }
        })?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(service) if service.is_no_such_key() => BlobError::not_found(key),
                _ => Self::map_aws_error(err),
            })?;

        let content_length = result.content_length.unwrap_or(0) as u64;
        let content_type = result.content_type.clone();
        let etag = result.e_tag.clone();
        let body = result.body.collect().await.map_err(Self::map_aws_error)?;

        Ok(GetResult {
            stream: once_stream(body.into_bytes()),
            size_bytes: content_length,
            content_type,
            etag,
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(service) if service.is_not_found() => BlobError::not_found(key),
                _ => Self::map_aws_error(err),
            })?;

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            content_type: result.content_type.clone(),
            etag: result.e_tag.clone(),
            last_modified: result.last_modified().and_then(Self::to_chrono),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let page = request.send().await.map_err(Self::map_aws_error)?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    blobs.push(BlobInfo {
                        key: BlobKey::from(key),
                        size_bytes: object.size().unwrap_or(0) as u64,
                        last_modified: object.last_modified().and_then(Self::to_chrono),
                    });
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(blobs)
    }

    fn locator(&self, key: &str) -> String {
        format!("{}/{}", self.locator_base, key)
    }
}
