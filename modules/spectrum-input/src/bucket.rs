use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use spectrum_checks::ObjectStoreListing;
use spectrum_poll::{Error, Result};
use tracing::info;

/// A bucket whose uploads start a workflow.
#[derive(Clone)]
pub struct InputBucket {
    name: String,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for InputBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBucket").field("name", &self.name).finish()
    }
}

impl InputBucket {
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// The store already configured for `name`.
    pub fn from_listing(listing: &ObjectStoreListing, name: &str) -> Result<Self> {
        Ok(Self::new(name, listing.store(name)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upload a local file, under its own file name unless `destination` is
    /// given. Returns the key written.
    pub async fn upload(&self, file: &Path, destination: Option<&str>, id: Option<&str>) -> Result<String> {
        let key = match destination {
            Some(destination) => destination.to_string(),
            None => file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Error::Config(format!("{} has no file name", file.display())))?,
        };
        let contents = tokio::fs::read(file)
            .await
            .map_err(|e| Error::Config(format!("Cannot read {}: {e}", file.display())))?;

        self.store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(contents))
            .await
            .map_err(Error::http)?;
        info!(id = id.unwrap_or_default(), file = %file.display(), bucket = %self.name, key = %key, "Uploaded");
        Ok(key)
    }

    /// Delete every object, or those under `prefix`. Returns how many went.
    pub async fn clean(&self, prefix: Option<&str>) -> Result<usize> {
        let prefix = prefix.map(ObjectPath::from);
        let objects: Vec<object_store::ObjectMeta> = self
            .store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(Error::http)?;
        for object in &objects {
            self.store.delete(&object.location).await.map_err(Error::http)?;
        }
        info!(bucket = %self.name, deleted = objects.len(), "Cleaned bucket");
        Ok(objects.len())
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;

    #[tokio::test]
    async fn uploads_under_the_file_name_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("elife-9006847-vor-r1.zip");
        std::fs::write(&file, b"zip").unwrap();
        let store = Arc::new(InMemory::new());
        let bucket = InputBucket::new("production", store.clone());

        let key = bucket.upload(&file, None, Some("9006847")).await.unwrap();
        bucket.upload(&file, Some("other/copy.zip"), None).await.unwrap();

        assert_eq!(key, "elife-9006847-vor-r1.zip");
        let stored = store.get(&ObjectPath::from(key.as_str())).await.unwrap().bytes().await.unwrap();
        assert_eq!(&stored[..], b"zip");
        assert_eq!(bucket.clean(Some("other")).await.unwrap(), 1);
        assert_eq!(bucket.clean(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let bucket = InputBucket::new("production", Arc::new(InMemory::new()));
        let err = bucket
            .upload(Path::new("/nonexistent/elife.zip"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
