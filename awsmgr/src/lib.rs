//! # awsmgr
//!
//! Thin, synchronous wrappers over three AWS services:
//!
//! - [`logs`]: list log groups and streams, filter log events (CloudWatch Logs)
//! - [`storage`]: bucket and object management (S3)
//! - [`notify`]: topics, SMS subscriptions and publishing (SNS)
//!
//! Every operation is a free function generic over a per-service backend
//! trait ([`LogsApi`], [`ObjectStore`], [`NotificationService`]). The `aws`
//! feature provides SDK-backed implementations; the in-memory backends are
//! always available for tests and dry runs.
//!
//! ## Features
//!
//! - `aws` (default): AWS SDK backends and the [`sdk`] module
//! - `serde`: `Serialize` for result types
//!
//! ## Example
//!
//! ```rust,no_run
//! use awsmgr::sdk::{AwsContext, ClientOptions};
//! use awsmgr::storage::{self, S3Store};
//!
//! fn main() -> awsmgr::Result<()> {
//!     let ctx = AwsContext::load(&ClientOptions::default())?;
//!     let store = S3Store::new(ctx);
//!
//!     for bucket in storage::list_buckets(&store)? {
//!         println!("{}", bucket.name);
//!     }
//!
//!     if storage::create_bucket(&store, "my-scratch-bucket", None)? {
//!         println!("created");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod error;
pub mod logs;
pub mod notify;
pub mod page;
#[cfg(feature = "aws")]
pub mod sdk;
pub mod storage;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). Only the first
/// registration takes effect.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER.get().is_some_and(|checker| checker())
}

fn interrupted_to_result(requested: bool) -> Result<()> {
    if requested {
        Err(Error::Interrupted)
    } else {
        Ok(())
    }
}

/// [`Error::Interrupted`] if the embedding application asked to stop.
pub(crate) fn check_interrupted() -> Result<()> {
    interrupted_to_result(is_interrupted_requested())
}

#[cfg(test)]
thread_local! {
    static TEST_INTERRUPTED: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Request (or clear) an interrupt for the calling test thread only.
#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    static REGISTER: std::sync::Once = std::sync::Once::new();
    REGISTER.call_once(|| {
        set_interrupt_checker(|| TEST_INTERRUPTED.with(std::cell::Cell::get));
    });
    TEST_INTERRUPTED.with(|flag| flag.set(value));
}

pub use {
    error::{Error, Result, Service},
    logs::{LogEvent, LogGroup, LogStream, LogsApi},
    notify::{NotificationService, PublishReceipt, SubscribeReceipt, Subscription, Topic},
    page::Page,
    storage::{Bucket, ObjectRef, ObjectStore, ObjectVersion, VersioningStatus, WaitPolicy},
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_checker_default_false() {
        assert!(!is_interrupted_requested());
        assert!(check_interrupted().is_ok());
    }

    #[test]
    fn test_set_interrupted_is_per_thread() {
        test_set_interrupted(true);
        assert!(is_interrupted_requested());
        assert!(matches!(check_interrupted(), Err(Error::Interrupted)));
        let other = std::thread::spawn(is_interrupted_requested).join().unwrap();
        assert!(!other);

        test_set_interrupted(false);
        assert!(check_interrupted().is_ok());
    }

    #[test]
    fn test_interrupt_request_maps_to_error() {
        assert!(matches!(interrupted_to_result(true), Err(Error::Interrupted)));
        assert!(interrupted_to_result(false).is_ok());
    }
}
