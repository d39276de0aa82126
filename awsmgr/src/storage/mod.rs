//! Bucket and object management.
//!
//! Operations are free functions generic over an [`ObjectStore`] backend.
//! Most are a single call-through; a few are short sequences of dependent
//! calls:
//!
//! - [`get_bucket`] may create the bucket and look it up again
//! - [`delete_bucket_objects`] lists every version, then bulk-deletes
//! - [`delete_buckets`] deletes and waits until each bucket is gone
//!
//! Remote failures are caught and logged in exactly two places: bucket
//! creation ([`create_bucket`] reports `false`) and the per-bucket loop of
//! [`delete_buckets`]. Everything else propagates to the caller.

pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;
pub mod wait;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use memory::InMemoryStore;
#[cfg(feature = "aws")]
pub use s3::S3Store;
pub use wait::{WaitPolicy, wait_until_bucket_not_exists};

/// Region used by [`create_bucket`] when none is given.
pub const DEFAULT_BUCKET_REGION: &str = "us-east-2";

/// Maximum identifiers the service accepts in one bulk delete.
pub const DELETE_BATCH_LIMIT: usize = 1000;

/// A bucket owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    pub creation_date: Option<DateTime<Utc>>,
}

/// A stored object, as addressed by the last call that touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectRef {
    /// Containing bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Version id, when the bucket is versioned.
    pub version_id: Option<String>,
}

/// A key + version pair, as returned by a version listing.
///
/// Delete markers are listed the same way as object versions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectVersion {
    /// Object key.
    pub key: String,
    /// Version id (`"null"` for objects written before versioning).
    pub version_id: Option<String>,
}

/// Bucket versioning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VersioningStatus {
    /// Versioning has never been enabled.
    #[default]
    Unversioned,
    /// New writes create versions.
    Enabled,
    /// Versioning was enabled, then suspended.
    Suspended,
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unversioned => write!(f, "Unversioned"),
            Self::Enabled => write!(f, "Enabled"),
            Self::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Backend for the object storage service.
///
/// Implementations:
///
/// - [`S3Store`]: the AWS SDK (feature `aws`)
/// - [`InMemoryStore`]: in-process fake for tests and dry runs
pub trait ObjectStore {
    /// Create a bucket in `region`.
    fn create_bucket(&self, name: &str, region: &str) -> Result<()>;

    /// List every bucket owned by the caller.
    fn list_buckets(&self) -> Result<Vec<Bucket>>;

    /// Whether the bucket exists (`HeadBucket`).
    fn bucket_exists(&self, name: &str) -> Result<bool>;

    /// Upload a local file under `key`.
    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<ObjectRef>;

    /// Download `key` (optionally one version of it) to `dest`.
    fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> Result<ObjectRef>;

    /// Turn versioning on.
    fn enable_versioning(&self, bucket: &str) -> Result<()>;

    /// Current versioning state.
    fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus>;

    /// Every object version and delete marker under `prefix`, across pages.
    fn list_object_versions(&self, bucket: &str, prefix: Option<&str>)
    -> Result<Vec<ObjectVersion>>;

    /// Quiet bulk delete of at most [`DELETE_BATCH_LIMIT`] targets.
    fn delete_objects(&self, bucket: &str, targets: &[ObjectVersion]) -> Result<()>;

    /// Delete an (empty) bucket.
    fn delete_bucket(&self, name: &str) -> Result<()>;
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Create a bucket, defaulting to [`DEFAULT_BUCKET_REGION`].
///
/// A remote failure is logged together with the request parameters and
/// reported as `Ok(false)`; only local errors are returned.
pub fn create_bucket<S: ObjectStore + ?Sized>(
    store: &S,
    name: &str,
    region: Option<&str>,
) -> Result<bool> {
    let region = non_empty(region).unwrap_or(DEFAULT_BUCKET_REGION);
    match store.create_bucket(name, region) {
        Ok(()) => {
            info!("Created bucket {name} in {region}");
            Ok(true)
        },
        Err(err) if err.is_remote() => {
            error!("{err} - Params bucket={name} location_constraint={region}");
            Ok(false)
        },
        Err(err) => Err(err),
    }
}

/// Look a bucket up by name among the caller's buckets.
fn find_bucket<S: ObjectStore + ?Sized>(store: &S, name: &str) -> Result<Option<Bucket>> {
    Ok(store
        .list_buckets()?
        .into_iter()
        .find(|bucket| bucket.name == name))
}

/// Fetch a bucket handle, creating the bucket first if asked to.
///
/// Returns `None` (after a warning) when the bucket does not exist and
/// `create` is false, or when creation did not make it appear.
pub fn get_bucket<S: ObjectStore + ?Sized>(
    store: &S,
    name: &str,
    create: bool,
    region: Option<&str>,
) -> Result<Option<Bucket>> {
    if let Some(bucket) = find_bucket(store, name)? {
        return Ok(Some(bucket));
    }
    if create {
        create_bucket(store, name, region)?;
        return get_bucket(store, name, false, region);
    }
    warn!("Bucket {name} does not exist!");
    Ok(None)
}

fn require_bucket<S: ObjectStore + ?Sized>(store: &S, name: &str) -> Result<Bucket> {
    get_bucket(store, name, false, None)?.ok_or_else(|| Error::NotFound(format!("bucket {name}")))
}

/// List every bucket owned by the caller.
pub fn list_buckets<S: ObjectStore + ?Sized>(store: &S) -> Result<Vec<Bucket>> {
    let buckets = store.list_buckets()?;
    debug!("Found {} buckets", buckets.len());
    Ok(buckets)
}

/// Object key for an uploaded file: `key_prefix` + the path as given.
///
/// Separators are normalized to `/` and a leading `./` is dropped.
pub fn object_key_for(file_path: &Path, key_prefix: Option<&str>) -> String {
    let path = file_path.to_string_lossy().replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    format!("{}{path}", key_prefix.unwrap_or(""))
}

/// Upload a local file into `bucket`.
pub fn create_bucket_object<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    file_path: &Path,
    key_prefix: Option<&str>,
) -> Result<ObjectRef> {
    let meta = fs::metadata(file_path)?;
    if !meta.is_file() {
        return Err(Error::InvalidArgument(format!(
            "{} is not a regular file",
            file_path.display()
        )));
    }
    require_bucket(store, bucket)?;

    let key = object_key_for(file_path, key_prefix);
    debug!("Uploading {} ({} bytes) to s3://{bucket}/{key}", file_path.display(), meta.len());
    store.upload_file(bucket, &key, file_path)
}

/// Local path an object downloads to: `dest` joined with the key's basename.
pub fn download_path_for(key: &str, dest: Option<&Path>) -> Result<PathBuf> {
    let name = key
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("object key '{key}' has no file name")))?;
    Ok(dest.unwrap_or_else(|| Path::new("")).join(name))
}

/// Download an object (optionally a specific version) into `dest`.
///
/// Returns the object reference and the local file path written.
pub fn get_bucket_object<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    dest: Option<&Path>,
    version_id: Option<&str>,
) -> Result<(ObjectRef, PathBuf)> {
    require_bucket(store, bucket)?;

    let file_path = download_path_for(key, dest)?;
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let object = store.download_file(bucket, key, non_empty(version_id), &file_path)?;
    debug!("Downloaded s3://{bucket}/{key} to {}", file_path.display());
    Ok((object, file_path))
}

/// Enable versioning and return the status reported afterwards.
pub fn enable_bucket_versioning<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
) -> Result<VersioningStatus> {
    require_bucket(store, bucket)?;
    store.enable_versioning(bucket)?;
    store.versioning_status(bucket)
}

/// Delete every object version under `key_prefix` (or the whole bucket).
///
/// Returns the number of key + version pairs deleted. Nothing is sent when
/// nothing matches.
pub fn delete_bucket_objects<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key_prefix: Option<&str>,
) -> Result<usize> {
    require_bucket(store, bucket)?;

    let targets = store.list_object_versions(bucket, non_empty(key_prefix))?;
    if targets.is_empty() {
        info!("No objects to delete in {bucket}");
        return Ok(0);
    }

    for chunk in targets.chunks(DELETE_BATCH_LIMIT) {
        store.delete_objects(bucket, chunk)?;
    }
    info!("Deleted {} object versions from {bucket}", targets.len());
    Ok(targets.len())
}

fn delete_and_wait<S: ObjectStore + ?Sized>(
    store: &S,
    name: &str,
    policy: &WaitPolicy,
) -> Result<()> {
    store.delete_bucket(name)?;
    wait_until_bucket_not_exists(store, name, policy)
}

/// Delete the named buckets, or every bucket when `names` is empty.
///
/// Each deletion waits until the bucket is confirmed gone. A remote failure
/// for one bucket is logged and skipped; a named bucket that does not exist
/// contributes nothing. `progress` is called after each bucket with
/// `(name, done, total)`.
///
/// Returns the number of buckets deleted.
pub fn delete_buckets<S: ObjectStore + ?Sized>(
    store: &S,
    names: &[String],
    policy: &WaitPolicy,
    progress: &mut dyn FnMut(&str, usize, usize),
) -> Result<usize> {
    let targets: Vec<String> = if names.is_empty() {
        store.list_buckets()?.into_iter().map(|b| b.name).collect()
    } else {
        let mut found = Vec::with_capacity(names.len());
        for name in names {
            if let Some(bucket) = get_bucket(store, name, false, None)? {
                found.push(bucket.name);
            }
        }
        found
    };

    let total = targets.len();
    let mut count = 0;
    for (done, name) in targets.iter().enumerate() {
        crate::check_interrupted()?;
        match delete_and_wait(store, name, policy) {
            Ok(()) => {
                info!("Deleted bucket {name}");
                count += 1;
            },
            Err(err) if err.is_remote() => warn!("Bucket {name}: {err}"),
            Err(err) => return Err(err),
        }
        progress(name, done + 1, total);
    }

    Ok(count)
}
