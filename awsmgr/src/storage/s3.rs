//! S3 backend on top of `aws-sdk-s3`.

use super::{Bucket, ObjectRef, ObjectStore, ObjectVersion, VersioningStatus};
use crate::error::{Error, Result, Service};
use crate::sdk::{AwsContext, remote_error};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, VersioningConfiguration,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Region that rejects an explicit location constraint.
const US_EAST_1: &str = "us-east-1";

/// Header S3 uses to report where a bucket lives, also on redirects.
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Known bucket regions, keyed by bucket name.
#[derive(Debug, Default)]
struct BucketRegions {
    regions: Mutex<HashMap<String, String>>,
}

impl BucketRegions {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, bucket: &str, region: &str) {
        if !bucket.is_empty() && !region.is_empty() {
            self.lock().insert(bucket.to_string(), region.to_string());
        }
    }

    /// Cached region for `bucket`, else the result of `lookup`.
    ///
    /// Only a found region is cached, so a miss is looked up again next time.
    fn resolve(&self, bucket: &str, lookup: impl FnOnce() -> Option<String>) -> Option<String> {
        if let Some(region) = self.lock().get(bucket) {
            return Some(region.clone());
        }
        let region = lookup().filter(|r| !r.is_empty())?;
        self.remember(bucket, &region);
        Some(region)
    }
}

/// [`ObjectStore`] backed by the S3 SDK client.
///
/// Per-bucket calls go to a client pinned to the bucket's own region, which
/// may differ from the configured one.
#[derive(Debug)]
pub struct S3Store {
    ctx: Arc<AwsContext>,
    client: Client,
    regions: BucketRegions,
    clients: Mutex<HashMap<String, Client>>,
}

impl S3Store {
    /// Build a client from a loaded context.
    pub fn new(ctx: Arc<AwsContext>) -> Self {
        let client = Self::build_client(&ctx, None);
        Self {
            ctx,
            client,
            regions: BucketRegions::default(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn build_client(ctx: &AwsContext, region: Option<&str>) -> Client {
        let mut builder = aws_sdk_s3::config::Builder::from(ctx.sdk_config())
            .force_path_style(ctx.options().force_path_style);
        if let Some(region) = region {
            builder = builder.region(Region::new(region.to_string()));
        }
        Client::from_conf(builder.build())
    }

    /// Client pinned to `region`; the shared client when it already is.
    fn client_in(&self, region: &str) -> Client {
        if self.ctx.region() == Some(region) {
            return self.client.clone();
        }
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(region.to_string())
            .or_insert_with(|| Self::build_client(&self.ctx, Some(region)))
            .clone()
    }

    /// Client for calls against `bucket`.
    ///
    /// Falls back to the shared client when the region cannot be found, so
    /// the call itself reports the failure.
    fn client_for(&self, bucket: &str) -> Client {
        match self.regions.resolve(bucket, || self.lookup_region(bucket)) {
            Some(region) => self.client_in(&region),
            None => self.client.clone(),
        }
    }

    /// Ask S3 where `bucket` lives. Redirect and error responses still
    /// carry the region header.
    fn lookup_region(&self, bucket: &str) -> Option<String> {
        let region = match self
            .ctx
            .block_on(self.client.head_bucket().bucket(bucket).send())
        {
            Ok(output) => output.bucket_region().map(str::to_owned),
            Err(err) => err
                .raw_response()
                .and_then(|response| response.headers().get(BUCKET_REGION_HEADER))
                .map(str::to_owned),
        };
        debug!("Bucket {bucket} region: {region:?}");
        region
    }
}

/// Stream into a new file at `dest`; the file is removed if writing fails.
fn write_or_remove<F>(dest: &Path, write: F) -> Result<usize>
where
    F: FnOnce(&mut File) -> Result<usize>,
{
    let mut file = File::create(dest)?;
    let result = write(&mut file).and_then(|written| {
        file.flush()?;
        Ok(written)
    });
    if result.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(dest) {
            warn!("Could not remove partial download {}: {e}", dest.display());
        }
    }
    result
}

fn to_utc(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn versioning_from_sdk(status: Option<&BucketVersioningStatus>) -> VersioningStatus {
    match status {
        Some(BucketVersioningStatus::Enabled) => VersioningStatus::Enabled,
        Some(BucketVersioningStatus::Suspended) => VersioningStatus::Suspended,
        _ => VersioningStatus::Unversioned,
    }
}

impl ObjectStore for S3Store {
    fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let client = self.client_in(region);
        let mut request = client.create_bucket().bucket(name);
        if region != US_EAST_1 {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        self.ctx
            .block_on(request.send())
            .map_err(|e| remote_error(Service::S3, "CreateBucket", e))?;
        self.regions.remember(name, region);
        Ok(())
    }

    fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let mut buckets = Vec::new();
        let mut continuation_token = None;
        loop {
            let output = self
                .ctx
                .block_on(
                    self.client
                        .list_buckets()
                        .set_continuation_token(continuation_token.take())
                        .send(),
                )
                .map_err(|e| remote_error(Service::S3, "ListBuckets", e))?;

            for bucket in output.buckets() {
                let name = bucket.name().unwrap_or_default();
                if let Some(region) = bucket.bucket_region() {
                    self.regions.remember(name, region);
                }
                buckets.push(Bucket {
                    name: name.to_string(),
                    creation_date: bucket.creation_date().and_then(to_utc),
                });
            }

            match output.continuation_token() {
                Some(token) if !token.is_empty() => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(buckets)
    }

    fn bucket_exists(&self, name: &str) -> Result<bool> {
        match self
            .ctx
            .block_on(self.client_for(name).head_bucket().bucket(name).send())
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().is_some_and(HeadBucketError::is_not_found)
                    || err
                        .raw_response()
                        .is_some_and(|response| response.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(remote_error(Service::S3, "HeadBucket", err))
                }
            },
        }
    }

    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<ObjectRef> {
        let body = self
            .ctx
            .block_on(ByteStream::from_path(path))
            .map_err(|e| Error::Io(io::Error::other(e)))?;

        let output = self
            .ctx
            .block_on(
                self.client_for(bucket)
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(body)
                    .send(),
            )
            .map_err(|e| remote_error(Service::S3, "PutObject", e))?;

        Ok(ObjectRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id: output.version_id().map(str::to_owned),
        })
    }

    fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> Result<ObjectRef> {
        let output = self
            .ctx
            .block_on(
                self.client_for(bucket)
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .set_version_id(version_id.map(str::to_owned))
                    .send(),
            )
            .map_err(|e| remote_error(Service::S3, "GetObject", e))?;

        let version_id = output.version_id().map(str::to_owned);
        let mut body = output.body;
        let written = write_or_remove(dest, |file| {
            self.ctx.block_on(async {
                let mut written = 0usize;
                while let Some(chunk) = body
                    .try_next()
                    .await
                    .map_err(|e| Error::remote(Service::S3, "GetObject", e.to_string()))?
                {
                    file.write_all(&chunk)?;
                    written += chunk.len();
                }
                Ok::<_, Error>(written)
            })
        })?;
        debug!("Wrote {written} bytes to {}", dest.display());

        Ok(ObjectRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id,
        })
    }

    fn enable_versioning(&self, bucket: &str) -> Result<()> {
        let configuration = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();
        self.ctx
            .block_on(
                self.client_for(bucket)
                    .put_bucket_versioning()
                    .bucket(bucket)
                    .versioning_configuration(configuration)
                    .send(),
            )
            .map_err(|e| remote_error(Service::S3, "PutBucketVersioning", e))?;
        Ok(())
    }

    fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus> {
        let output = self
            .ctx
            .block_on(
                self.client_for(bucket)
                    .get_bucket_versioning()
                    .bucket(bucket)
                    .send(),
            )
            .map_err(|e| remote_error(Service::S3, "GetBucketVersioning", e))?;
        Ok(versioning_from_sdk(output.status()))
    }

    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectVersion>> {
        let mut found = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;
        let client = self.client_for(bucket);

        loop {
            let output = self
                .ctx
                .block_on(
                    client
                        .list_object_versions()
                        .bucket(bucket)
                        .set_prefix(prefix.map(str::to_owned))
                        .set_key_marker(key_marker.take())
                        .set_version_id_marker(version_id_marker.take())
                        .send(),
                )
                .map_err(|e| remote_error(Service::S3, "ListObjectVersions", e))?;

            found.extend(output.versions().iter().map(|v| ObjectVersion {
                key: v.key().unwrap_or_default().to_string(),
                version_id: v.version_id().map(str::to_owned),
            }));
            found.extend(output.delete_markers().iter().map(|m| ObjectVersion {
                key: m.key().unwrap_or_default().to_string(),
                version_id: m.version_id().map(str::to_owned),
            }));

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_owned);
            version_id_marker = output.next_version_id_marker().map(str::to_owned);
            if key_marker.is_none() && version_id_marker.is_none() {
                break;
            }
        }

        debug!("Listed {} versions in {bucket}", found.len());
        Ok(found)
    }

    fn delete_objects(&self, bucket: &str, targets: &[ObjectVersion]) -> Result<()> {
        let objects = targets
            .iter()
            .map(|target| {
                ObjectIdentifier::builder()
                    .key(&target.key)
                    .set_version_id(target.version_id.clone())
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let output = self
            .ctx
            .block_on(
                self.client_for(bucket)
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send(),
            )
            .map_err(|e| remote_error(Service::S3, "DeleteObjects", e))?;

        for failure in output.errors() {
            warn!(
                "Could not delete {} ({}): {}",
                failure.key().unwrap_or("?"),
                failure.code().unwrap_or("unknown"),
                failure.message().unwrap_or("")
            );
        }
        Ok(())
    }

    fn delete_bucket(&self, name: &str) -> Result<()> {
        self.ctx
            .block_on(self.client_for(name).delete_bucket().bucket(name).send())
            .map_err(|e| remote_error(Service::S3, "DeleteBucket", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioning_from_sdk() {
        assert_eq!(
            versioning_from_sdk(Some(&BucketVersioningStatus::Enabled)),
            VersioningStatus::Enabled
        );
        assert_eq!(
            versioning_from_sdk(Some(&BucketVersioningStatus::Suspended)),
            VersioningStatus::Suspended
        );
        assert_eq!(versioning_from_sdk(None), VersioningStatus::Unversioned);
    }

    #[test]
    fn test_to_utc() {
        let value = aws_sdk_s3::primitives::DateTime::from_secs(1_704_067_200);
        assert_eq!(
            to_utc(&value).map(|dt| dt.to_rfc3339()).as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_bucket_regions_looks_up_once() {
        let regions = BucketRegions::default();
        let mut lookups = 0;
        for _ in 0..3 {
            let region = regions.resolve("logs-archive", || {
                lookups += 1;
                Some("eu-west-1".to_string())
            });
            assert_eq!(region.as_deref(), Some("eu-west-1"));
        }
        assert_eq!(lookups, 1);
    }

    #[test]
    fn test_bucket_regions_retries_unresolved() {
        let regions = BucketRegions::default();
        assert_eq!(regions.resolve("missing", || None), None);
        assert_eq!(regions.resolve("missing", || Some(String::new())), None);
        assert_eq!(
            regions.resolve("missing", || Some("ap-south-1".to_string())).as_deref(),
            Some("ap-south-1")
        );
    }

    #[test]
    fn test_bucket_regions_remembered_skip_lookup() {
        let regions = BucketRegions::default();
        regions.remember("listed", "us-west-2");
        regions.remember("", "us-west-2");
        let region = regions.resolve("listed", || panic!("cached region must be used"));
        assert_eq!(region.as_deref(), Some("us-west-2"));
        assert_eq!(regions.resolve("", || None), None);
    }

    #[test]
    fn test_write_or_remove_keeps_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.csv");
        let written = write_or_remove(&dest, |file| {
            file.write_all(b"a,b\n")?;
            Ok(4)
        })
        .unwrap();
        assert_eq!(written, 4);
        assert_eq!(fs::read(&dest).unwrap(), b"a,b\n");
    }

    #[test]
    fn test_write_or_remove_deletes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.csv");
        let err = write_or_remove(&dest, |file| {
            file.write_all(b"a,b\n1,")?;
            Err(Error::remote(Service::S3, "GetObject", "connection reset"))
        })
        .unwrap_err();
        assert!(err.is_remote());
        assert!(!dest.exists());
    }
}
