use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use super::{validate_key, BlobObject, BlobStore, ByteStream, StoreError, StoreResult};
use crate::config::settings::S3Settings;

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

fn blob_err<E: std::error::Error>(context: &str, e: E) -> StoreError {
    StoreError::Blob(format!("{}: {}", context, DisplayErrorContext(e)))
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &settings.endpoint {
            // Required for MinIO and other S3-compatible endpoints
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!("✅ S3 blob store ready (bucket: {})", settings.bucket);

        Self {
            client,
            bucket: settings.bucket.clone(),
        }
    }

    async fn put_small(&self, key: &str, content_type: &str, body: Bytes) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(S3ByteStream::from(body))
            .send()
            .await
            .map_err(|e| blob_err("put_object", e))?;
        Ok(())
    }

    async fn create_multipart_upload(&self, key: &str, content_type: &str) -> StoreResult<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| blob_err("create_multipart_upload", e))?;

        result
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::Blob("create_multipart_upload returned no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(S3ByteStream::from(body))
            .send()
            .await
            .map_err(|e| blob_err("upload_part", e))?;

        Ok(CompletedPart::builder()
            .set_e_tag(result.e_tag().map(str::to_string))
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<()> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(|e| blob_err("complete_multipart_upload", e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| blob_err("abort_multipart_upload", e))?;

        Ok(())
    }
}

/// Buffers a stream into S3 parts. Nothing is visible at the key until
/// `finish` completes the upload.
struct MultipartUploader<'s> {
    store: &'s S3BlobStore,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
}

impl<'s> MultipartUploader<'s> {
    async fn new(store: &'s S3BlobStore, key: &str, content_type: &str, first: Vec<u8>) -> StoreResult<Self> {
        let upload_id = store.create_multipart_upload(key, content_type).await?;

        Ok(Self {
            store,
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: first,
        })
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> StoreResult<()> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }

        Ok(())
    }

    async fn flush_part(&mut self) -> StoreResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let body = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(MIN_PART_SIZE),
        ));

        let part = self
            .store
            .upload_part(&self.key, &self.upload_id, self.part_number, body)
            .await?;

        self.parts.push(part);
        self.part_number += 1;

        Ok(())
    }

    async fn finish(mut self) -> StoreResult<()> {
        self.flush_part().await?;

        self.store
            .complete_multipart_upload(&self.key, &self.upload_id, self.parts)
            .await
    }

    async fn abort(&self) {
        if let Err(e) = self.store.abort_multipart_upload(&self.key, &self.upload_id).await {
            error!(key = %self.key, "Failed to abort multipart upload: {}", e);
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put<'a>(&self, key: &str, content_type: &str, mut body: ByteStream<'a>) -> StoreResult<u64> {
        validate_key(key)?;

        let mut written = 0u64;
        let mut head: Vec<u8> = Vec::new();
        let mut uploader: Option<MultipartUploader<'_>> = None;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    error!(key, "Stream error during upload: {}", e);
                    if let Some(up) = &uploader {
                        up.abort().await;
                    }
                    return Err(e.into());
                }
            };
            written += chunk.len() as u64;

            match uploader.as_mut() {
                Some(up) => {
                    if let Err(e) = up.write_chunk(&chunk).await {
                        up.abort().await;
                        return Err(e);
                    }
                }
                None => {
                    head.extend_from_slice(&chunk);
                    if head.len() >= MIN_PART_SIZE {
                        let mut up =
                            MultipartUploader::new(self, key, content_type, std::mem::take(&mut head)).await?;
                        if let Err(e) = up.flush_part().await {
                            up.abort().await;
                            return Err(e);
                        }
                        uploader = Some(up);
                    }
                }
            }
        }

        match uploader {
            Some(up) => {
                let key_for_abort = up.key.clone();
                let upload_id = up.upload_id.clone();
                if let Err(e) = up.finish().await {
                    let _ = self.abort_multipart_upload(&key_for_abort, &upload_id).await;
                    return Err(e);
                }
            }
            None => self.put_small(key, content_type, Bytes::from(head)).await?,
        }

        debug!(key, bytes = written, "stored blob in S3");
        Ok(written)
    }

    async fn get(&self, key: &str) -> StoreResult<BlobObject> {
        validate_key(key)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::Missing(key.to_string())
                } else {
                    blob_err("get_object", e)
                }
            })?;

        let content_type = resp
            .content_type()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string();
        let content_length = resp.content_length().and_then(|l| u64::try_from(l).ok());

        let reader = resp.body.into_async_read();

        Ok(BlobObject {
            body: ReaderStream::new(reader).boxed(),
            content_type,
            content_length,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| blob_err("delete_object", e))?;

        debug!(key, "deleted blob");
        Ok(())
    }
}
