//! # Resync Configuration
//!
//! Connection parameters, poll settings and the endpoint list.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RESYNC_API_KEY=...                                                 │
//! │     RESYNC_POLL_INTERVAL_SECS=1                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <PATH>, or                                                │
//! │     ~/.config/resync/resync.toml (Linux)                               │
//! │     ~/Library/Application Support/com.resync.resync/resync.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     12 polls, 10s apart, 30s per request                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The configuration is resolved once at startup and never mutated
//! afterwards. The engine receives it by value or behind an `Arc`.
//!
//! ## Configuration File Format
//! ```toml
//! [connection]
//! base_url = "https://cloudapi.cloud.couchbase.com/v4"
//! organization_id = "org-1"
//! project_id = "proj-1"
//! cluster_id = "cluster-1"
//! app_service_id = "svc-1"
//! api_key = "secret"
//!
//! [poll]
//! max_retries = 12
//! interval_secs = 10
//!
//! [http]
//! request_timeout_secs = 30
//!
//! [[endpoints]]
//! name = "lite"
//! scope = "data"
//! resync_collections = ["UserInfo"]
//!
//! [[endpoints.functions]]
//! collection = "UserInfo"
//! file = "sync-functions/lite/UserInfo.js"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use resync_core::validation::{
    validate_identifier, validate_max_retries, validate_poll_interval_secs,
};
use resync_core::{CoreError, EndpointDescriptor, PollPolicy};
use resync_core::{DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_SECS};

use crate::error::{EngineError, EngineResult};

/// Default control-plane base URL.
pub const DEFAULT_BASE_URL: &str = "https://cloudapi.cloud.couchbase.com/v4";

/// File name used under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "resync.toml";

// =============================================================================
// Connection
// =============================================================================

/// Identifiers and credential for the remote control plane.
///
/// The four identifiers and the endpoint name are path segments of every
/// request.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub cluster_id: String,

    #[serde(default)]
    pub app_service_id: String,

    /// Bearer credential.
    #[serde(default)]
    pub api_key: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            base_url: default_base_url(),
            organization_id: String::new(),
            project_id: String::new(),
            cluster_id: String::new(),
            app_service_id: String::new(),
            api_key: String::new(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .field("project_id", &self.project_id)
            .field("cluster_id", &self.cluster_id)
            .field("app_service_id", &self.app_service_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ConnectionConfig {
    /// Parses the base URL.
    pub fn base(&self) -> EngineResult<Url> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        if url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(format!(
                "Base URL cannot carry a path: {}",
                self.base_url
            )));
        }
        Ok(url)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.base()?;
        validate_identifier("organization_id", &self.organization_id)?;
        validate_identifier("project_id", &self.project_id)?;
        validate_identifier("cluster_id", &self.cluster_id)?;
        validate_identifier("app_service_id", &self.app_service_id)?;

        if self.api_key.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "api_key is required (set it in the config file or RESYNC_API_KEY)".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Poll & HTTP Settings
// =============================================================================

/// Poll budget and interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Maximum number of status calls per endpoint.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds between two status calls.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            max_retries: default_max_retries(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl PollSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(self.max_retries, Duration::from_secs(self.interval_secs))
    }
}

/// Per-call HTTP limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Upper bound for one whole request, response body included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// An access-control function to publish before the resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSettings {
    pub collection: String,

    /// Source file. Relative paths resolve against the config file's directory.
    pub file: PathBuf,
}

/// One endpoint as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub name: String,

    pub scope: String,

    /// Collections to resync. Empty means the endpoint is skipped.
    #[serde(default)]
    pub resync_collections: Vec<String>,

    #[serde(default)]
    pub functions: Vec<FunctionSettings>,
}

impl EndpointSettings {
    pub fn descriptor(&self) -> EndpointDescriptor {
        EndpointDescriptor::new(&self.name, &self.scope, self.resync_collections.iter().cloned())
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete resync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResyncConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub poll: PollSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub endpoints: Vec<EndpointSettings>,

    /// Directory of the file this config was loaded from.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl ResyncConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Default values
    /// 2. Config file (`path`, or the platform default if it exists)
    /// 3. Environment variables
    ///
    /// An explicitly given path must exist.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading resync config from file");
                config = Self::from_file(&path)?;
            } else if explicit {
                return Err(EngineError::ConfigLoadFailed(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file without applying overrides or validation.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: ResyncConfig = toml::from_str(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Resync config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        self.connection.validate()?;

        validate_max_retries(self.poll.max_retries)?;
        validate_poll_interval_secs(self.poll.interval_secs)?;

        if self.http.request_timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "HTTP timeouts must be greater than 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.descriptor().validate()?;

            if !names.insert(endpoint.name.as_str()) {
                return Err(CoreError::DuplicateEndpoint(endpoint.name.clone()).into());
            }

            if !endpoint.functions.is_empty() {
                validate_identifier("endpoint name", &endpoint.name)?;
                validate_identifier("scope", &endpoint.scope)?;
            }
            for function in &endpoint.functions {
                validate_identifier("collection", &function.collection)?;
            }
        }

        Ok(())
    }

    /// Applies `RESYNC_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let connection = &mut self.connection;
        let strings: [(&str, &mut String); 6] = [
            ("RESYNC_BASE_URL", &mut connection.base_url),
            ("RESYNC_ORGANIZATION_ID", &mut connection.organization_id),
            ("RESYNC_PROJECT_ID", &mut connection.project_id),
            ("RESYNC_CLUSTER_ID", &mut connection.cluster_id),
            ("RESYNC_APP_SERVICE_ID", &mut connection.app_service_id),
            ("RESYNC_API_KEY", &mut connection.api_key),
        ];
        for (key, slot) in strings {
            if let Some(value) = lookup(key) {
                debug!(key, "Overriding connection setting from environment");
                *slot = value;
            }
        }

        if let Some(value) = lookup("RESYNC_MAX_RETRIES") {
            match value.parse() {
                Ok(n) => self.poll.max_retries = n,
                Err(_) => warn!(value = %value, "Ignoring invalid RESYNC_MAX_RETRIES"),
            }
        }

        if let Some(value) = lookup("RESYNC_POLL_INTERVAL_SECS") {
            match value.parse() {
                Ok(n) => self.poll.interval_secs = n,
                Err(_) => warn!(value = %value, "Ignoring invalid RESYNC_POLL_INTERVAL_SECS"),
            }
        }

        if let Some(value) = lookup("RESYNC_REQUEST_TIMEOUT_SECS") {
            match value.parse() {
                Ok(n) => self.http.request_timeout_secs = n,
                Err(_) => warn!(value = %value, "Ignoring invalid RESYNC_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "resync", "resync")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Descriptors for every configured endpoint, in file order.
    pub fn descriptors(&self) -> Vec<EndpointDescriptor> {
        self.endpoints.iter().map(EndpointSettings::descriptor).collect()
    }

    /// Endpoints restricted to `names`, in config order. An empty filter
    /// selects every endpoint.
    pub fn select_endpoints(&self, names: &[String]) -> EngineResult<Vec<&EndpointSettings>> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.endpoints.iter().any(|e| &e.name == *n))
        {
            return Err(CoreError::UnknownEndpoint(unknown.clone()).into());
        }

        Ok(self
            .endpoints
            .iter()
            .filter(|e| names.is_empty() || names.contains(&e.name))
            .collect())
    }

    /// Resolves a function source path against the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[connection]
base_url = "https://cloudapi.example.com/v4"
organization_id = "org"
project_id = "proj"
cluster_id = "cluster"
app_service_id = "svc"
api_key = "secret"

[poll]
interval_secs = 1

[[endpoints]]
name = "lite"
scope = "data"
resync_collections = ["UserInfo", "Reports"]

[[endpoints.functions]]
collection = "UserInfo"
file = "functions/UserInfo.js"

[[endpoints]]
name = "grande"
scope = "data"
"#;

    fn sample() -> ResyncConfig {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll.max_retries, 12);
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.http.request_timeout_secs, 30);
        assert_eq!(config.endpoints.len(), 2);
        assert!(config.endpoints[1].resync_collections.is_empty());

        let descriptors = config.descriptors();
        assert_eq!(descriptors[0], EndpointDescriptor::new("lite", "data", ["UserInfo", "Reports"]));
        assert!(!descriptors[1].has_work());
    }

    #[test]
    fn test_default_config_is_incomplete() {
        let config = ResyncConfig::default();
        assert_eq!(config.connection.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = sample();

        config.connection.api_key = String::new();
        assert!(config.validate().is_err());

        config = sample();
        config.connection.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        config = sample();
        config.poll.max_retries = 0;
        assert!(config.validate().is_err());

        config = sample();
        config.endpoints[1].name = "lite".into();
        assert!(matches!(
            config.validate(),
            Err(EngineError::Core(CoreError::DuplicateEndpoint(_)))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RESYNC_API_KEY", "from-env"),
            ("RESYNC_POLL_INTERVAL_SECS", "5"),
            ("RESYNC_MAX_RETRIES", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = sample();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.connection.api_key, "from-env");
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.max_retries, 12);
    }

    #[test]
    fn test_select_endpoints() {
        let config = sample();
        assert_eq!(config.select_endpoints(&[]).unwrap().len(), 2);

        let selected = config.select_endpoints(&["grande".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "grande");

        assert!(matches!(
            config.select_endpoints(&["missing".to_string()]),
            Err(EngineError::Core(CoreError::UnknownEndpoint(_)))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let text = format!("{:?}", sample().connection);
        assert!(!text.contains("secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resync.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ResyncConfig::from_file(&path).unwrap();
        let function = &config.endpoints[0].functions[0];
        assert_eq!(
            config.resolve_path(&function.file),
            dir.path().join("functions/UserInfo.js")
        );
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ResyncConfig::load(Some(dir.path().join("absent.toml")));
        assert!(matches!(result, Err(EngineError::ConfigLoadFailed(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/resync.toml");

        let saved = sample().save(Some(path.clone())).unwrap();
        assert_eq!(saved, path);

        let reloaded = ResyncConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.endpoints, sample().endpoints);
    }
}
