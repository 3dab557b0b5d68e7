//! S3-compatible object store binding.
//!
//! Works against AWS S3 and S3-compatible services (MinIO, Ceph RGW). Versions
//! are the object's ETag, its last-modified second and a hash of its metadata.
//! Preconditions map to:
//!
//! - `IfAbsent`: `If-None-Match: *` on `PutObject`
//! - `IfMatch` on put: `If-Match: <etag>`
//! - `IfMatch` on metadata copy: `x-amz-copy-source-if-unmodified-since` when
//!   the last-modified second is known, else `x-amz-copy-source-if-match`
//! - `IfMatch` on delete: a fresh `HeadObject` compared against the whole
//!   version, then `If-Match: <etag>`
//!
//! An in-place metadata copy keeps a single-part object's ETag, so the ETag
//! alone never reveals a concurrent owner change. Two races remain: a copy
//! landing in the same second as the previous modification, and a change
//! landing between a delete's re-probe and the delete itself.

use std::collections::HashMap;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::MetadataDirective;
use tracing::debug;

use super::{ObjectBody, ObjectHead, ObjectStore, Precondition, StoreError, VersionToken};
use crate::config::{RetryMode, StoreConfig};
use crate::digest::digest_bytes;
use crate::metadata::MetadataMap;

const PRECONDITION_FAILED: u16 = 412;
const NOT_FOUND: u16 = 404;

/// S3 store bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
  client: Client,
  bucket: String,
}

impl S3Store {
  /// Build a client from configuration and bind it to `bucket`.
  pub async fn connect(config: &StoreConfig, bucket: &str) -> Self {
    let client = build_s3_client(config).await;
    Self::from_client(client, bucket)
  }

  /// Wrap an existing client.
  pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
    Self {
      client,
      bucket: bucket.into(),
    }
  }

  /// Same client, different bucket.
  pub fn with_bucket(&self, bucket: impl Into<String>) -> Self {
    Self::from_client(self.client.clone(), bucket)
  }

  pub fn bucket(&self) -> &str {
    &self.bucket
  }

  pub fn client(&self) -> &Client {
    &self.client
  }
}

/// Build an S3 client from configuration.
async fn build_s3_client(config: &StoreConfig) -> Client {
  let retry = match config.retry_mode {
    RetryMode::Standard => RetryConfig::standard(),
    RetryMode::Adaptive => RetryConfig::adaptive(),
  }
  .with_max_attempts(config.retry_max_attempts.max(1));

  let mut loader = aws_config::defaults(BehaviorVersion::latest())
    .region(Region::new(config.region.clone()))
    .retry_config(retry);

  if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
    loader = loader.credentials_provider(Credentials::new(key_id, secret, None, None, "shelf-config"));
  }

  let sdk_config = loader.load().await;
  let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

  if let Some(endpoint) = &config.endpoint_url {
    s3_config_builder = s3_config_builder.endpoint_url(endpoint);
  }

  if config.force_path_style {
    s3_config_builder = s3_config_builder.force_path_style(true);
  }

  Client::from_conf(s3_config_builder.build())
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
  err.raw_response().map(|response| response.status().as_u16())
}

fn classify<E>(op: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
  E: std::error::Error + Send + Sync + 'static,
{
  if status_of(&err) == Some(PRECONDITION_FAILED) {
    return StoreError::PreconditionFailed { key: key.to_string() };
  }
  StoreError::Backend {
    op,
    key: key.to_string(),
    message: DisplayErrorContext(err).to_string(),
  }
}

/// `CopySource` value for copying an object onto itself.
fn copy_source(bucket: &str, key: &str) -> String {
  format!("{}/{}", bucket, urlencoding::encode(key))
}

/// Hash of a metadata map, stable across probes of an unchanged object.
fn fingerprint(metadata: &MetadataMap) -> String {
  let canonical = serde_json::to_vec(metadata).unwrap_or_default();
  digest_bytes(&canonical)
}

/// Source condition sent with an in-place metadata copy.
#[derive(Debug, PartialEq, Eq)]
enum CopyCondition {
  UnmodifiedSince(i64),
  Match(String),
}

/// `If-Unmodified-Since` and `If-Match` are not combined: S3 copies anyway when
/// the ETag matches, which it always does after a metadata-only change.
fn copy_condition(version: VersionToken) -> CopyCondition {
  match version.modified_secs {
    Some(secs) => CopyCondition::UnmodifiedSince(secs),
    None => CopyCondition::Match(version.tag),
  }
}

fn to_sdk_metadata(metadata: MetadataMap) -> Option<HashMap<String, String>> {
  if metadata.is_empty() {
    None
  } else {
    Some(metadata.into_iter().collect())
  }
}

impl ObjectStore for S3Store {
  async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
    match self.client.head_object().bucket(&self.bucket).key(key).send().await {
      Ok(output) => {
        let metadata: MetadataMap = output
          .metadata()
          .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
          .unwrap_or_default();
        let version = VersionToken {
          tag: output.e_tag().unwrap_or_default().to_string(),
          modified_secs: output.last_modified().map(DateTime::secs),
          fingerprint: Some(fingerprint(&metadata)),
        };
        Ok(Some(ObjectHead { metadata, version }))
      }
      Err(err) if status_of(&err) == Some(NOT_FOUND) => Ok(None),
      Err(err) => Err(classify("head_object", key, err)),
    }
  }

  async fn put(&self, key: &str, body: ObjectBody, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let stream = match body {
      ObjectBody::Bytes(bytes) => ByteStream::from(bytes),
      ObjectBody::File(path) => ByteStream::from_path(&path).await.map_err(|e| StoreError::Backend {
        op: "put_object",
        key: key.to_string(),
        message: format!("cannot stream {}: {}", path.display(), e),
      })?,
    };

    let mut request = self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(key)
      .body(stream)
      .set_metadata(to_sdk_metadata(metadata));

    request = match precondition {
      Precondition::None => request,
      Precondition::IfAbsent => request.if_none_match("*"),
      Precondition::IfMatch(version) => request.if_match(version.tag),
    };

    request.send().await.map_err(|e| classify("put_object", key, e))?;
    debug!(bucket = %self.bucket, key = %key, "put object");
    Ok(())
  }

  async fn copy_metadata(&self, key: &str, metadata: MetadataMap, precondition: Precondition) -> Result<(), StoreError> {
    let mut request = self
      .client
      .copy_object()
      .bucket(&self.bucket)
      .key(key)
      .copy_source(copy_source(&self.bucket, key))
      .metadata_directive(MetadataDirective::Replace)
      .set_metadata(to_sdk_metadata(metadata));

    match precondition {
      Precondition::None => {}
      Precondition::IfAbsent => return Err(StoreError::PreconditionFailed { key: key.to_string() }),
      Precondition::IfMatch(version) => {
        request = match copy_condition(version) {
          CopyCondition::UnmodifiedSince(secs) => request.copy_source_if_unmodified_since(DateTime::from_secs(secs)),
          CopyCondition::Match(tag) => request.copy_source_if_match(tag),
        };
      }
    }

    request.send().await.map_err(|e| classify("copy_object", key, e))?;
    debug!(bucket = %self.bucket, key = %key, "replaced object metadata");
    Ok(())
  }

  async fn delete(&self, key: &str, precondition: Precondition) -> Result<(), StoreError> {
    let mut request = self.client.delete_object().bucket(&self.bucket).key(key);

    match precondition {
      Precondition::None => {}
      Precondition::IfAbsent => return Err(StoreError::PreconditionFailed { key: key.to_string() }),
      Precondition::IfMatch(version) => {
        // DeleteObject has no metadata condition; re-probe right before it.
        let current = self.head(key).await?;
        if current.map(|head| head.version).as_ref() != Some(&version) {
          debug!(bucket = %self.bucket, key = %key, "object changed before delete");
          return Err(StoreError::PreconditionFailed { key: key.to_string() });
        }
        request = request.if_match(version.tag);
      }
    }

    match request.send().await {
      Ok(_) => {
        debug!(bucket = %self.bucket, key = %key, "deleted object");
        Ok(())
      }
      Err(err) if status_of(&err) == Some(NOT_FOUND) => Ok(()),
      Err(err) => Err(classify("delete_object", key, err)),
    }
  }

  async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let mut pages = self
      .client
      .list_objects_v2()
      .bucket(&self.bucket)
      .set_prefix(prefix.map(str::to_string))
      .into_paginator()
      .send();

    let mut keys = Vec::new();
    while let Some(page) = pages.next().await {
      let page = page.map_err(|e| classify("list_objects_v2", prefix.unwrap_or(""), e))?;
      keys.extend(page.contents().iter().filter_map(|object| object.key().map(str::to_string)));
    }

    debug!(bucket = %self.bucket, count = keys.len(), "listed objects");
    Ok(keys)
  }
}
