//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::ovh::{DEFAULT_ENDPOINT, OvhCredentials};
use crate::reclaim::{DEFAULT_TEST_PREFIX, ReclaimConfig, ReclaimError};

/// Sweep settings derived from environment variables and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "OVH",
    discovery(
        app_name = "ovh-sweep",
        env_var = "OVH_SWEEP_CONFIG_PATH",
        config_file_name = "ovh-sweep.toml",
        dotfile_name = ".ovh-sweep.toml",
        project_file_name = "ovh-sweep.toml"
    )
)]
pub struct SweepSettings {
    /// API endpoint alias or base URL. Defaults to `ovh-eu`.
    #[ortho_config(default = DEFAULT_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// Application key issued by OVH.
    pub application_key: Option<String>,
    /// Application secret paired with the key.
    pub application_secret: Option<String>,
    /// Consumer key authorising the application on the account.
    pub consumer_key: Option<String>,
    /// Cloud project dedicated to acceptance tests.
    pub cloud_project_service_test: Option<String>,
    /// vRack attached to the test project. Private networks only exist when
    /// one is configured, so the sweep is skipped without it.
    pub vrack_service_test: Option<String>,
    /// Name prefix marking test-created resources.
    #[ortho_config(default = DEFAULT_TEST_PREFIX.to_owned())]
    pub test_prefix: String,
    /// Per-network time budget in seconds.
    #[ortho_config(default = 300)]
    pub sweep_timeout_secs: u64,
    /// Number of networks reclaimed at once.
    #[ortho_config(default = 1)]
    pub sweep_concurrency: usize,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

const APPLICATION_KEY: FieldMetadata = FieldMetadata::new(
    "OVH application key",
    "OVH_APPLICATION_KEY",
    "application_key",
);
const APPLICATION_SECRET: FieldMetadata = FieldMetadata::new(
    "OVH application secret",
    "OVH_APPLICATION_SECRET",
    "application_secret",
);
const CONSUMER_KEY: FieldMetadata =
    FieldMetadata::new("OVH consumer key", "OVH_CONSUMER_KEY", "consumer_key");
const CLOUD_PROJECT: FieldMetadata = FieldMetadata::new(
    "test cloud project",
    "OVH_CLOUD_PROJECT_SERVICE_TEST",
    "cloud_project_service_test",
);
const VRACK: FieldMetadata = FieldMetadata::new(
    "test vRack",
    "OVH_VRACK_SERVICE_TEST",
    "vrack_service_test",
);

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

impl SweepSettings {
    fn require_field(value: Option<&str>, metadata: &FieldMetadata) -> Result<String, ConfigError> {
        present(value).map(str::to_owned).ok_or_else(|| {
            ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to ovh-sweep.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            ))
        })
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("ovh-sweep")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// API credentials for the OVH client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// to set when a key is missing or blank.
    pub fn credentials(&self) -> Result<OvhCredentials, ConfigError> {
        Ok(OvhCredentials {
            endpoint: self.endpoint.trim().to_owned(),
            application_key: Self::require_field(
                self.application_key.as_deref(),
                &APPLICATION_KEY,
            )?,
            application_secret: Self::require_field(
                self.application_secret.as_deref(),
                &APPLICATION_SECRET,
            )?,
            consumer_key: Self::require_field(self.consumer_key.as_deref(), &CONSUMER_KEY)?,
        })
    }

    /// Project to sweep, present only when both the test project and the
    /// test vRack are configured.
    #[must_use]
    pub fn owner_context(&self) -> Option<String> {
        let project = present(self.cloud_project_service_test.as_deref());
        let vrack = present(self.vrack_service_test.as_deref());
        for (value, metadata) in [(project, &CLOUD_PROJECT), (vrack, &VRACK)] {
            if value.is_none() {
                debug!(
                    event = "sweep.config.unset",
                    env_var = metadata.env_var,
                    "{} is not set; private networks will not be swept",
                    metadata.description
                );
            }
        }
        project.zip(vrack).map(|(owner, _)| owner.to_owned())
    }

    /// Builds the reclamation config from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the prefix is blank or the
    /// timeout is zero.
    pub fn reclaim_config(&self) -> Result<ReclaimConfig, ConfigError> {
        let config = ReclaimConfig::new(self.owner_context(), self.test_prefix.as_str())?
            .with_time_budget(Duration::from_secs(self.sweep_timeout_secs))?
            .with_concurrency(self.sweep_concurrency);
        Ok(config)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<ReclaimError> for ConfigError {
    fn from(value: ReclaimError) -> Self {
        Self::Invalid(value.to_string())
    }
}
