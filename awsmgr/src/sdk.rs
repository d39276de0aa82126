//! Shared SDK plumbing: config loading and the blocking runtime bridge.
//!
//! The AWS SDK is async. awsmgr exposes a synchronous API, so every AWS
//! backend holds an [`AwsContext`] that owns a current-thread tokio runtime
//! and blocks on one request at a time.
//!
//! ```rust,no_run
//! use awsmgr::sdk::{AwsContext, ClientOptions};
//!
//! fn main() -> awsmgr::Result<()> {
//!     let options = ClientOptions::default().with_region(Some("eu-west-1".into()));
//!     let ctx = AwsContext::load(&options)?;
//!     println!("region: {:?}", ctx.region());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result, Service};
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use log::debug;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Options that shape how SDK clients are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Region override (otherwise resolved from the environment).
    pub region: Option<String>,
    /// Named credentials profile.
    pub profile: Option<String>,
    /// Endpoint override, e.g. a local emulator.
    pub endpoint_url: Option<String>,
    /// Use path-style S3 addressing (needed by most emulators).
    pub force_path_style: bool,
}

impl ClientOptions {
    /// Set the region override.
    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    /// Set the credentials profile.
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Set the endpoint override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: Option<String>) -> Self {
        self.endpoint_url = endpoint_url;
        self
    }

    /// Enable path-style S3 addressing.
    #[must_use]
    pub fn with_force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }
}

/// Loaded SDK configuration plus the runtime used to drive requests.
pub struct AwsContext {
    runtime: tokio::runtime::Runtime,
    sdk_config: aws_config::SdkConfig,
    options: ClientOptions,
}

impl fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AwsContext {
    /// Resolve credentials and region from the environment and `options`.
    ///
    /// Fails with [`Error::Config`] when no region can be resolved, since
    /// every later call would fail the same way.
    pub fn load(options: &ClientOptions) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = runtime.block_on(loader.load());

        if sdk_config.region().is_none() {
            return Err(Error::Config(
                "no AWS region configured (use --region or set AWS_REGION)".to_string(),
            ));
        }

        let ctx = Self {
            runtime,
            sdk_config,
            options: options.clone(),
        };
        debug!("Loaded AWS config: {ctx:?}");
        Ok(Arc::new(ctx))
    }

    /// Region the clients will talk to.
    pub fn region(&self) -> Option<&str> {
        self.sdk_config.region().map(AsRef::as_ref)
    }

    /// The resolved SDK configuration.
    pub fn sdk_config(&self) -> &aws_config::SdkConfig {
        &self.sdk_config
    }

    /// Options the context was loaded with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Drive one request to completion on the owned runtime.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Convert an SDK failure into [`Error::Remote`], keeping the service code.
pub(crate) fn remote_error<E, R>(
    service: Service,
    operation: &'static str,
    err: SdkError<E, R>,
) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let code = err.code().map(str::to_owned);
    Error::Remote {
        service,
        operation,
        code,
        message: DisplayErrorContext(err).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_options_builders() {
        let options = ClientOptions::default()
            .with_region(Some("eu-west-1".into()))
            .with_profile(Some("dev".into()))
            .with_endpoint_url(Some("http://localhost:4566".into()))
            .with_force_path_style(true);
        assert_eq!(options.region.as_deref(), Some("eu-west-1"));
        assert_eq!(options.profile.as_deref(), Some("dev"));
        assert_eq!(options.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(options.force_path_style);
    }

    #[test]
    fn test_client_options_default_is_empty() {
        let options = ClientOptions::default();
        assert!(options.region.is_none());
        assert!(options.profile.is_none());
        assert!(options.endpoint_url.is_none());
        assert!(!options.force_path_style);
    }

    #[test]
    fn test_remote_error_keeps_service_code() {
        use aws_sdk_sns::operation::publish::PublishError;
        use aws_smithy_types::error::ErrorMetadata;

        let source = PublishError::generic(
            ErrorMetadata::builder()
                .code("NotFound")
                .message("Topic does not exist")
                .build(),
        );
        let err = remote_error(Service::Sns, "Publish", SdkError::service_error(source, ()));
        assert!(err.is_remote());
        assert_eq!(err.code(), Some("NotFound"));
        assert!(matches!(err, Error::Remote { service: Service::Sns, operation: "Publish", .. }));
    }
}
