use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use regex::Regex;
use spectrum_common::Settings;
use spectrum_poll::{Diagnostic, Error, PollOutcome, Poller, Result};
use tracing::{debug, info, warn};

use crate::check::{fill_template, wait_for, Check, Fields};

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Anything that can list the keys of a named bucket.
#[async_trait]
pub trait ObjectListing: Send + Sync {
    /// Objects of `bucket` whose key starts with `prefix` (all of them when `None`).
    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<StoredObject>>;
}

/// Named buckets backed by `object_store` stores (S3 in environments, memory in tests).
#[derive(Clone, Default)]
pub struct ObjectStoreListing {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }

    /// S3 stores for `buckets`, with credentials from the usual AWS env vars.
    pub fn s3(settings: &Settings, buckets: &[&str]) -> Result<Self> {
        let mut listing = Self::new();
        for bucket in buckets.iter().filter(|b| !b.is_empty()) {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(&settings.aws_region)
                .with_bucket_name(*bucket);
            if let Some(endpoint) = &settings.s3_endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }
            let store = builder
                .build()
                .map_err(|e| Error::Config(format!("Cannot configure bucket {bucket}: {e}")))?;
            listing = listing.with_bucket(*bucket, Arc::new(store));
        }
        Ok(listing)
    }

    pub fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        self.stores
            .get(bucket)
            .cloned()
            .ok_or_else(|| Error::Config(format!("No object store configured for bucket {bucket}")))
    }
}

#[async_trait]
impl ObjectListing for ObjectStoreListing {
    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<StoredObject>> {
        let store = self.store(bucket)?;

        // object_store prefixes are whole path segments: list the enclosing
        // directory and filter on the raw string prefix.
        let directory = prefix
            .and_then(|p| p.rfind('/').map(|idx| &p[..idx]))
            .filter(|d| !d.is_empty())
            .map(Path::from);

        let objects: Vec<object_store::ObjectMeta> = store
            .list(directory.as_ref())
            .try_collect()
            .await
            .map_err(Error::http)?;

        Ok(objects
            .into_iter()
            .filter(|meta| prefix.map_or(true, |p| meta.location.as_ref().starts_with(p)))
            .map(|meta| StoredObject {
                key: meta.location.to_string(),
                last_modified: meta.last_modified,
            })
            .collect())
    }
}

/// What a matching key yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketMatch {
    /// The pattern has no capture groups.
    Present,
    Captured {
        groups: Vec<Option<String>>,
        key: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BucketQuery {
    pub fields: Fields,
    /// Only keys modified strictly after this instant count.
    pub last_modified_after: Option<DateTime<Utc>>,
}

/// Polls for a key matching a templated regex in one bucket.
#[derive(Clone)]
pub struct BucketFileCheck {
    storage: Arc<dyn ObjectListing>,
    bucket: String,
    key: String,
    prefix: Option<String>,
    poller: Poller,
}

impl BucketFileCheck {
    /// `key` is a regex template matched from the start of each key;
    /// `prefix` is a template narrowing the listing.
    pub fn new(
        storage: Arc<dyn ObjectListing>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        prefix: Option<&str>,
    ) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            key: key.into(),
            prefix: prefix.map(str::to_string),
            poller: Poller::from_env(),
        }
    }

    pub fn with_poller(self, poller: Poller) -> Self {
        Self { poller, ..self }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn of(&self, fields: Fields) -> Result<BucketMatch> {
        self.wait(BucketQuery {
            fields,
            last_modified_after: None,
        })
        .await
    }

    pub async fn of_modified_after(&self, fields: Fields, after: DateTime<Utc>) -> Result<BucketMatch> {
        self.wait(BucketQuery {
            fields,
            last_modified_after: Some(after),
        })
        .await
    }

    pub async fn wait(&self, query: BucketQuery) -> Result<BucketMatch> {
        wait_for(self, &self.poller, &query).await
    }

    fn criteria(&self, fields: &Fields) -> Result<Regex> {
        let criteria = fill_template(&self.key, fields)?;
        Regex::new(&format!("^(?:{criteria})"))
            .map_err(|e| Error::Config(format!("Invalid key pattern {criteria}: {e}")))
    }
}

#[async_trait]
impl Check for BucketFileCheck {
    type Query = BucketQuery;
    type Found = BucketMatch;

    fn describe(&self, query: &BucketQuery) -> String {
        let criteria =
            fill_template(&self.key, &query.fields).unwrap_or_else(|_| self.key.clone());
        let mut description = format!(
            "object matching criteria {criteria} in bucket {}",
            self.bucket
        );
        if let Some(after) = query.last_modified_after {
            description.push_str(&format!(" and being last_modified after {after}"));
        }
        description
    }

    async fn observe(&self, query: &BucketQuery) -> Result<PollOutcome<BucketMatch>> {
        let criteria = self.criteria(&query.fields)?;
        let prefix = match &self.prefix {
            Some(template) => Some(fill_template(template, &query.fields)?),
            None => None,
        };
        let id = query.fields.get("id").unwrap_or_default();
        if let Some(prefix) = &prefix {
            debug!(id, prefix = %prefix, "Filtering by prefix");
        }

        let objects = match self.storage.list_objects(&self.bucket, prefix.as_deref()).await {
            Ok(objects) => objects,
            Err(Error::Http(message)) => {
                warn!(id, bucket = %self.bucket, error = %message, "Cannot list bucket, will retry");
                return Ok(PollOutcome::pending_with(Diagnostic::Text(message)));
            }
            Err(e) => return Err(e),
        };

        for object in objects {
            let Some(captures) = criteria.captures(&object.key) else {
                continue;
            };
            debug!(
                id,
                key = %object.key,
                bucket = %self.bucket,
                last_modified = %object.last_modified,
                "Found candidate"
            );
            if let Some(after) = query.last_modified_after {
                if object.last_modified.timestamp() <= after.timestamp() {
                    continue;
                }
            }
            info!(
                id,
                key = %object.key,
                bucket = %self.bucket,
                last_modified = %object.last_modified,
                "Found object"
            );

            if captures.len() == 1 {
                return Ok(PollOutcome::Success(BucketMatch::Present));
            }
            let groups: Vec<Option<String>> = captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect();
            info!(id, groups = ?groups, key = %object.key, "Found groups matching the key");
            return Ok(PollOutcome::Success(BucketMatch::Captured {
                groups,
                key: object.key,
            }));
        }
        Ok(PollOutcome::pending())
    }
}
