//! In-memory object storage backend.

use super::{Bucket, ObjectRef, ObjectStore, ObjectVersion, VersioningStatus};
use crate::error::{Error, Result, Service};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NULL_VERSION: &str = "null";

#[derive(Debug, Clone)]
struct MemVersion {
    key: String,
    version_id: String,
    data: Vec<u8>,
    delete_marker: bool,
}

#[derive(Debug)]
struct MemBucket {
    region: String,
    creation_date: DateTime<Utc>,
    versioning: VersioningStatus,
    // Oldest first; the last entry for a key is its current version.
    versions: Vec<MemVersion>,
}

impl MemBucket {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            creation_date: Utc::now(),
            versioning: VersioningStatus::Unversioned,
            versions: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, MemBucket>,
    // Deleted buckets that still answer HeadBucket for this many checks.
    lingering: BTreeMap<String, u32>,
    delete_lag: u32,
    next_version: u64,
    create_calls: usize,
    head_calls: usize,
    delete_objects_calls: usize,
}

impl State {
    fn bucket(&self, operation: &'static str, name: &str) -> Result<&MemBucket> {
        self.buckets.get(name).ok_or_else(|| no_such_bucket(operation, name))
    }

    fn bucket_mut(&mut self, operation: &'static str, name: &str) -> Result<&mut MemBucket> {
        self.buckets.get_mut(name).ok_or_else(|| no_such_bucket(operation, name))
    }

    /// Store a new current version of `key`; returns its version id.
    fn write(
        &mut self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        delete_marker: bool,
    ) -> Result<String> {
        self.next_version += 1;
        let next = self.next_version;
        let bucket = self.bucket_mut("PutObject", bucket)?;
        let version_id = if bucket.versioning == VersioningStatus::Enabled {
            format!("v{next}")
        } else {
            bucket
                .versions
                .retain(|v| !(v.key == key && v.version_id == NULL_VERSION));
            NULL_VERSION.to_string()
        };
        bucket.versions.push(MemVersion {
            key: key.to_string(),
            version_id: version_id.clone(),
            data,
            delete_marker,
        });
        Ok(version_id)
    }
}

fn s3_error(operation: &'static str, code: &str, message: String) -> Error {
    Error::Remote {
        service: Service::S3,
        operation,
        code: Some(code.to_string()),
        message,
    }
}

fn no_such_bucket(operation: &'static str, name: &str) -> Error {
    s3_error(operation, "NoSuchBucket", format!("The specified bucket does not exist: {name}"))
}

fn exposed_version(status: VersioningStatus, version_id: &str) -> Option<String> {
    (status != VersioningStatus::Unversioned || version_id != NULL_VERSION)
        .then(|| version_id.to_string())
}

/// [`ObjectStore`] that keeps buckets and object versions in process memory.
///
/// Mirrors the service behaviors the operations depend on: duplicate
/// creation fails, non-empty buckets cannot be deleted, and versioned
/// buckets keep every write plus delete markers.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create a bucket directly (no call recorded).
    pub fn add_bucket(&self, name: &str) {
        self.state()
            .buckets
            .entry(name.to_string())
            .or_insert_with(|| MemBucket::new(super::DEFAULT_BUCKET_REGION));
    }

    /// Write an object from memory. Returns the version id when versioned.
    pub fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> Result<Option<String>> {
        let mut state = self.state();
        let version_id = state.write(bucket, key, data.to_vec(), false)?;
        let status = state.bucket("PutObject", bucket)?.versioning;
        Ok(exposed_version(status, &version_id))
    }

    /// Add a delete marker on top of `key`.
    pub fn put_delete_marker(&self, bucket: &str, key: &str) -> Result<()> {
        self.state().write(bucket, key, Vec::new(), true).map(|_| ())
    }

    /// Keep answering `HeadBucket` for `checks` calls after each delete.
    pub fn set_delete_lag(&self, checks: u32) {
        self.state().delete_lag = checks;
    }

    /// Names of the current buckets, sorted.
    pub fn bucket_names(&self) -> Vec<String> {
        self.state().buckets.keys().cloned().collect()
    }

    /// Region a bucket was created in.
    pub fn bucket_region(&self, name: &str) -> Option<String> {
        self.state().buckets.get(name).map(|b| b.region.clone())
    }

    /// Stored versions and delete markers in a bucket.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.state().buckets.get(bucket).map_or(0, |b| b.versions.len())
    }

    /// Number of `CreateBucket` calls received.
    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    /// Number of `HeadBucket` calls received.
    pub fn head_calls(&self) -> usize {
        self.state().head_calls
    }

    /// Number of `DeleteObjects` calls received.
    pub fn delete_objects_calls(&self) -> usize {
        self.state().delete_objects_calls
    }
}

impl ObjectStore for InMemoryStore {
    fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let mut state = self.state();
        state.create_calls += 1;
        if state.buckets.contains_key(name) {
            return Err(s3_error(
                "CreateBucket",
                "BucketAlreadyOwnedByYou",
                format!("Your previous request to create the named bucket succeeded: {name}"),
            ));
        }
        state.lingering.remove(name);
        state.buckets.insert(name.to_string(), MemBucket::new(region));
        Ok(())
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        Ok(self
            .state()
            .buckets
            .iter()
            .map(|(name, bucket)| Bucket {
                name: name.clone(),
                creation_date: Some(bucket.creation_date),
            })
            .collect())
    }

    fn bucket_exists(&self, name: &str) -> Result<bool> {
        let mut state = self.state();
        state.head_calls += 1;
        if state.buckets.contains_key(name) {
            return Ok(true);
        }
        match state.lingering.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<ObjectRef> {
        let data = fs::read(path)?;
        let mut state = self.state();
        let version_id = state.write(bucket, key, data, false)?;
        let status = state.bucket("PutObject", bucket)?.versioning;
        Ok(ObjectRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id: exposed_version(status, &version_id),
        })
    }

    fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> Result<ObjectRef> {
        let state = self.state();
        let mem = state.bucket("GetObject", bucket)?;
        let found = match version_id {
            Some(id) => mem
                .versions
                .iter()
                .find(|v| v.key == key && v.version_id == id)
                .ok_or_else(|| {
                    s3_error("GetObject", "NoSuchVersion", format!("No version {id} of {key}"))
                })?,
            None => mem
                .versions
                .iter()
                .rev()
                .find(|v| v.key == key)
                .filter(|v| !v.delete_marker)
                .ok_or_else(|| {
                    s3_error(
                        "GetObject",
                        "NoSuchKey",
                        format!("The specified key does not exist: {key}"),
                    )
                })?,
        };
        fs::write(dest, &found.data)?;
        Ok(ObjectRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id: exposed_version(mem.versioning, &found.version_id),
        })
    }

    fn enable_versioning(&self, bucket: &str) -> Result<()> {
        self.state().bucket_mut("PutBucketVersioning", bucket)?.versioning =
            VersioningStatus::Enabled;
        Ok(())
    }

    fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus> {
        Ok(self.state().bucket("GetBucketVersioning", bucket)?.versioning)
    }

    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectVersion>> {
        let state = self.state();
        Ok(state
            .bucket("ListObjectVersions", bucket)?
            .versions
            .iter()
            .filter(|v| prefix.is_none_or(|p| v.key.starts_with(p)))
            .map(|v| ObjectVersion {
                key: v.key.clone(),
                version_id: Some(v.version_id.clone()),
            })
            .collect())
    }

    fn delete_objects(&self, bucket: &str, targets: &[ObjectVersion]) -> Result<()> {
        if targets.len() > super::DELETE_BATCH_LIMIT {
            return Err(s3_error(
                "DeleteObjects",
                "MalformedXML",
                format!("{} keys exceeds the per-request limit", targets.len()),
            ));
        }
        let mut state = self.state();
        state.delete_objects_calls += 1;
        let mem = state.bucket_mut("DeleteObjects", bucket)?;
        mem.versions.retain(|v| {
            !targets.iter().any(|t| {
                t.key == v.key && t.version_id.as_deref().unwrap_or(NULL_VERSION) == v.version_id
            })
        });
        Ok(())
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        let mem = state.bucket("DeleteBucket", name)?;
        if !mem.versions.is_empty() {
            return Err(s3_error(
                "DeleteBucket",
                "BucketNotEmpty",
                format!("The bucket you tried to delete is not empty: {name}"),
            ));
        }
        state.buckets.remove(name);
        let lag = state.delete_lag;
        if lag > 0 {
            state.lingering.insert(name.to_string(), lag);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unversioned_overwrite_keeps_single_version() {
        let store = InMemoryStore::new();
        store.add_bucket("b");
        assert!(store.put_object("b", "k", b"1").unwrap().is_none());
        assert!(store.put_object("b", "k", b"2").unwrap().is_none());
        assert_eq!(store.object_count("b"), 1);
    }

    #[test]
    fn test_versioned_writes_accumulate() {
        let store = InMemoryStore::new();
        store.add_bucket("b");
        store.enable_versioning("b").unwrap();
        let v1 = store.put_object("b", "k", b"1").unwrap();
        let v2 = store.put_object("b", "k", b"2").unwrap();
        assert!(v1.is_some());
        assert_ne!(v1, v2);
        assert_eq!(store.object_count("b"), 2);
    }

    #[test]
    fn test_download_through_delete_marker_is_no_such_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        store.add_bucket("b");
        store.enable_versioning("b").unwrap();
        store.put_object("b", "k", b"1").unwrap();
        store.put_delete_marker("b", "k").unwrap();

        let err = store
            .download_file("b", "k", None, &dir.path().join("k"))
            .unwrap_err();
        assert_eq!(err.code(), Some("NoSuchKey"));
    }

    #[test]
    fn test_delete_non_empty_bucket_fails() {
        let store = InMemoryStore::new();
        store.add_bucket("b");
        store.put_object("b", "k", b"1").unwrap();
        let err = store.delete_bucket("b").unwrap_err();
        assert_eq!(err.code(), Some("BucketNotEmpty"));
    }

    #[test]
    fn test_delete_lag_counts_down() {
        let store = InMemoryStore::new();
        store.add_bucket("b");
        store.set_delete_lag(1);
        store.delete_bucket("b").unwrap();
        assert!(store.bucket_exists("b").unwrap());
        assert!(!store.bucket_exists("b").unwrap());
    }

    #[test]
    fn test_delete_objects_rejects_oversized_batch() {
        let store = InMemoryStore::new();
        store.add_bucket("b");
        let targets = vec![
            ObjectVersion {
                key: "k".into(),
                version_id: None,
            };
            super::super::DELETE_BATCH_LIMIT + 1
        ];
        let err = store.delete_objects("b", &targets).unwrap_err();
        assert_eq!(err.code(), Some("MalformedXML"));
    }
}
