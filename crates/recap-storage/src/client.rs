//! R2 client implementation.

use std::collections::HashMap;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Bounded parallelism for per-object HEAD calls during metadata listings.
pub const DEFAULT_HEAD_PARALLELISM: usize = 10;

/// Configuration for the artifact store.
#[derive(Debug, Clone)]
pub struct ArtifactStoreConfig {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL used to build artifact reference URLs
    pub public_base_url: String,
}

impl ArtifactStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| StorageError::config_error("R2_PUBLIC_BASE_URL not set"))?,
        })
    }
}

/// Keyed blob store backed by Cloudflare R2.
#[derive(Clone)]
pub struct ArtifactStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

/// Information about a listed object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch)
    pub last_modified: Option<u64>,
    /// Custom metadata, populated only by metadata listings and head
    pub custom_metadata: HashMap<String, String>,
}

/// One page of a cursor-paged listing.
#[derive(Debug, Clone)]
pub struct ObjectPage {
    pub objects: Vec<ObjectInfo>,
    /// Cursor for the next page, present when truncated
    pub cursor: Option<String>,
    pub truncated: bool,
}

/// Head metadata for a single object.
#[derive(Debug, Clone)]
pub struct HeadInfo {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub custom_metadata: HashMap<String, String>,
}

impl ArtifactStore {
    /// Create a new store from configuration.
    pub async fn new(config: ArtifactStoreConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = ArtifactStoreConfig::from_env()?;
        Self::new(config).await
    }

    /// Public reference URL for a key.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Reject keys that could escape the keyspace.
    ///
    /// Identifiers are validated upstream against the clip-id lexicon; this
    /// is the last line before the wire.
    fn check_key(key: &str) -> StorageResult<()> {
        if key.is_empty()
            || key.starts_with('/')
            || key.contains("..")
            || key.contains('\\')
            || key.contains('\0')
        {
            return Err(StorageError::invalid_key(key));
        }
        Ok(())
    }

    /// Upload bytes under a key with custom metadata.
    pub async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        custom_metadata: HashMap<String, String>,
    ) -> StorageResult<()> {
        Self::check_key(key)?;
        debug!("Uploading {} bytes to {}", data.len(), key);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type);

        for (name, value) in custom_metadata {
            request = request.metadata(name, value);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Download an object as bytes.
    pub async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        Self::check_key(key)?;
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    /// Fetch and deserialize a JSON artifact.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let bytes = self.get(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Head an object: size, content type, and custom metadata, no body.
    pub async fn head(&self, key: &str) -> StorageResult<HeadInfo> {
        Self::check_key(key)?;

        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::AwsSdk(msg)
                }
            })?;

        Ok(HeadInfo {
            key: key.to_string(),
            size: response.content_length().unwrap_or(0) as u64,
            content_type: response
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
            custom_metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List one page of objects under a prefix.
    ///
    /// Listings may be truncated; callers continue with the returned cursor.
    pub async fn list(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: Option<i32>,
    ) -> StorageResult<ObjectPage> {
        debug!("Listing objects with prefix: {}", prefix);

        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix);

        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }
        if let Some(limit) = limit {
            request = request.max_keys(limit);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let mut objects = Vec::new();
        if let Some(contents) = &response.contents {
            for obj in contents {
                objects.push(ObjectInfo {
                    key: obj.key.clone().unwrap_or_default(),
                    size: obj.size.unwrap_or(0) as u64,
                    last_modified: obj
                        .last_modified
                        .as_ref()
                        .and_then(|t| t.to_millis().ok())
                        .map(|ms| ms as u64),
                    custom_metadata: HashMap::new(),
                });
            }
        }

        let truncated = response.is_truncated() == Some(true);
        Ok(ObjectPage {
            objects,
            cursor: if truncated {
                response.next_continuation_token
            } else {
                None
            },
            truncated,
        })
    }

    /// List every object under a prefix, following the cursor.
    pub async fn list_all(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list(prefix, cursor.as_deref(), None).await?;
            objects.extend(page.objects);
            if page.truncated {
                cursor = page.cursor;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    /// List one page and populate each object's custom metadata via HEAD.
    ///
    /// S3 listings do not carry object metadata, so status filters HEAD the
    /// page's keys with bounded parallelism instead of fetching bodies.
    pub async fn list_with_metadata(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: Option<i32>,
    ) -> StorageResult<ObjectPage> {
        let page = self.list(prefix, cursor, limit).await?;

        let heads: Vec<StorageResult<HeadInfo>> = stream::iter(page.objects.iter())
            .map(|obj| self.head(&obj.key))
            .buffered(DEFAULT_HEAD_PARALLELISM)
            .collect()
            .await;

        let mut objects = Vec::with_capacity(page.objects.len());
        for (mut obj, head) in page.objects.into_iter().zip(heads) {
            match head {
                Ok(info) => {
                    obj.custom_metadata = info.custom_metadata;
                    objects.push(obj);
                }
                // Deleted between LIST and HEAD; skip it
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(ObjectPage {
            objects,
            cursor: page.cursor,
            truncated: page.truncated,
        })
    }

    /// Delete an object.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        Self::check_key(key)?;
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Delete multiple objects.
    pub async fn delete_batch(&self, keys: &[String]) -> StorageResult<u32> {
        if keys.is_empty() {
            return Ok(0);
        }
        for key in keys {
            Self::check_key(key)?;
        }

        debug!("Deleting {} objects", keys.len());

        let objects: Vec<_> = keys
            .iter()
            .map(|k| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .expect("valid key")
            })
            .collect();

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        info!("Deleted {} objects", keys.len());
        Ok(keys.len() as u32)
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_keys_rejected() {
        assert!(ArtifactStore::check_key("transcripts/../secrets").is_err());
        assert!(ArtifactStore::check_key("/absolute").is_err());
        assert!(ArtifactStore::check_key("a\\b").is_err());
        assert!(ArtifactStore::check_key("a\0b").is_err());
        assert!(ArtifactStore::check_key("").is_err());
        assert!(ArtifactStore::check_key("transcripts/ClipA_01.json").is_ok());
    }
}
