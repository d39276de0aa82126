//! `awsmgr s3` operations.

use anyhow::{Context, Result};
use awsmgr::storage::{self, ObjectStore, WaitPolicy};
use clap::Subcommand;
use console::style;
use dialoguer::{Confirm, Error as DialoguerError, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use super::write_json;
use crate::CliError;

/// S3 bucket and object operations.
#[derive(Debug, Subcommand)]
#[command(rename_all = "snake_case")]
pub(crate) enum S3Command {
    /// Create a bucket.
    CreateBucket {
        /// Name of the bucket.
        bucket_name: String,

        /// Region to create the bucket in (default: config, then the client region).
        #[arg(long = "bucket_region", value_name = "REGION")]
        bucket_region: Option<String>,
    },

    /// Show a bucket, optionally creating it.
    GetBucket {
        /// Name of the bucket.
        bucket_name: String,

        /// Create the bucket if it does not exist.
        #[arg(long)]
        create: bool,

        /// Region used when creating.
        #[arg(long = "bucket_region", value_name = "REGION")]
        bucket_region: Option<String>,
    },

    /// List buckets.
    ListBuckets,

    /// Upload a file as an object.
    CreateBucketObject {
        /// Name of the bucket.
        bucket_name: String,

        /// Path to the file.
        file_path: PathBuf,

        /// Prefix for the object key.
        #[arg(long = "key_prefix")]
        key_prefix: Option<String>,
    },

    /// Download an object.
    GetBucketObject {
        /// Name of the bucket.
        bucket_name: String,

        /// Key of the object.
        object_key: String,

        /// Destination directory to save the object.
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Version ID of the object.
        #[arg(long = "version_id")]
        version_id: Option<String>,
    },

    /// Enable bucket versioning.
    EnableBucketVersioning {
        /// Name of the bucket.
        bucket_name: String,
    },

    /// Delete every object version under a prefix.
    DeleteBucketObjects {
        /// Name of the bucket.
        bucket_name: String,

        /// Prefix for the object keys (without it, the whole bucket is emptied).
        #[arg(long = "key_prefix")]
        key_prefix: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete buckets (all of them when no name is given).
    DeleteBuckets {
        /// Names of the buckets.
        bucket_names: Vec<String>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Settings that come from config rather than the operation's flags.
#[derive(Debug, Clone, Default)]
pub(crate) struct S3Settings {
    /// Default bucket region from config.
    pub bucket_region: Option<String>,
    /// Region the client talks to.
    pub client_region: Option<String>,
    /// Bucket-delete waiter.
    pub wait: WaitPolicy,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl S3Settings {
    /// Region for a new bucket: the flag, then config, then the client's.
    fn bucket_region<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.bucket_region.as_deref())
            .or(self.client_region.as_deref())
    }
}

/// Prompt text for operations that wipe everything, `None` otherwise.
fn destructive_prompt(command: &S3Command) -> Option<String> {
    match command {
        S3Command::DeleteBuckets {
            bucket_names,
            yes: false,
        } if bucket_names.is_empty() => {
            Some("Delete ALL buckets in this account?".to_string())
        },
        S3Command::DeleteBucketObjects {
            bucket_name,
            key_prefix,
            yes: false,
        } if key_prefix.as_deref().is_none_or(str::is_empty) => Some(format!(
            "Delete every object version in bucket {bucket_name}?"
        )),
        _ => None,
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Confirmation cancelled".to_string()).into()
            } else {
                CliError::Usage(format!("Confirmation prompt failed: {io_err}")).into()
            }
        },
    }
}

/// Ask before wiping a whole bucket or account.
///
/// Runs before any client is built, so a refused or impossible confirmation
/// never reaches the network.
pub(crate) fn confirm_destructive(command: &S3Command, non_interactive: bool) -> Result<()> {
    let Some(prompt) = destructive_prompt(command) else {
        return Ok(());
    };

    let interactive =
        !non_interactive && std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
    if !interactive {
        return Err(CliError::Usage(format!(
            "{} Refusing without confirmation in non-interactive mode; pass --yes to proceed",
            prompt.trim_end_matches('?')
        ))
        .into());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(())
    } else {
        Err(CliError::Cancelled("Aborted by user".to_string()).into())
    }
}

fn delete_progress_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

/// Run one s3 operation against `store`.
pub(crate) fn run<S: ObjectStore + ?Sized>(
    store: &S,
    command: &S3Command,
    settings: &S3Settings,
    out: &mut dyn Write,
    json: bool,
) -> Result<()> {
    match command {
        S3Command::CreateBucket {
            bucket_name,
            bucket_region,
        } => {
            let region = settings.bucket_region(bucket_region.as_deref());
            let created = storage::create_bucket(store, bucket_name, region)?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "bucket": bucket_name, "created": created }),
                );
            }
            if created {
                writeln!(out, "Created bucket {bucket_name}")?;
            } else {
                writeln!(out, "Bucket {bucket_name} was not created")?;
            }
        },

        S3Command::GetBucket {
            bucket_name,
            create,
            bucket_region,
        } => {
            let region = settings.bucket_region(bucket_region.as_deref());
            let bucket = storage::get_bucket(store, bucket_name, *create, region)?;
            if json {
                return write_json(out, &serde_json::json!({ "bucket": bucket }));
            }
            if let Some(bucket) = bucket {
                match bucket.creation_date {
                    Some(created) => writeln!(out, "{}\t{}", bucket.name, created.to_rfc3339())?,
                    None => writeln!(out, "{}", bucket.name)?,
                }
            }
        },

        S3Command::ListBuckets => {
            let buckets = storage::list_buckets(store)?;
            if json {
                return write_json(out, &serde_json::json!({ "buckets": buckets }));
            }
            for bucket in &buckets {
                writeln!(out, "{}", bucket.name)?;
            }
            writeln!(out, "Found {} buckets!", buckets.len())?;
        },

        S3Command::CreateBucketObject {
            bucket_name,
            file_path,
            key_prefix,
        } => {
            let object =
                storage::create_bucket_object(store, bucket_name, file_path, key_prefix.as_deref())
                    .with_context(|| format!("Failed to upload {}", file_path.display()))?;
            if json {
                return write_json(out, &object);
            }
            match &object.version_id {
                Some(version) => writeln!(out, "s3://{}/{} ({version})", object.bucket, object.key)?,
                None => writeln!(out, "s3://{}/{}", object.bucket, object.key)?,
            }
        },

        S3Command::GetBucketObject {
            bucket_name,
            object_key,
            dest,
            version_id,
        } => {
            let (object, path) = storage::get_bucket_object(
                store,
                bucket_name,
                object_key,
                dest.as_deref(),
                version_id.as_deref(),
            )
            .with_context(|| format!("Failed to download s3://{bucket_name}/{object_key}"))?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "object": object, "path": path }),
                );
            }
            writeln!(out, "{}", path.display())?;
        },

        S3Command::EnableBucketVersioning { bucket_name } => {
            let status = storage::enable_bucket_versioning(store, bucket_name)?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "bucket": bucket_name, "status": status }),
                );
            }
            writeln!(out, "Versioning: {status}")?;
        },

        S3Command::DeleteBucketObjects {
            bucket_name,
            key_prefix,
            ..
        } => {
            let deleted = storage::delete_bucket_objects(store, bucket_name, key_prefix.as_deref())?;
            if json {
                return write_json(
                    out,
                    &serde_json::json!({ "bucket": bucket_name, "deleted": deleted }),
                );
            }
            writeln!(out, "Deleted {deleted} object versions")?;
        },

        S3Command::DeleteBuckets { bucket_names, .. } => {
            let pb = delete_progress_bar(settings.progress);
            let deleted = storage::delete_buckets(
                store,
                bucket_names,
                &settings.wait,
                &mut |name: &str, done: usize, total: usize| {
                    pb.set_length(total as u64);
                    pb.set_position(done as u64);
                    pb.set_message(name.to_string());
                },
            )?;
            pb.finish_and_clear();

            if json {
                return write_json(out, &serde_json::json!({ "deleted": deleted }));
            }
            if settings.progress {
                eprintln!("{} Deleted {deleted} buckets", style("✓").green().bold());
            }
            writeln!(out, "Deleted {deleted} buckets")?;
        },
    }

    Ok(())
}
