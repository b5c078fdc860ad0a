use crate::error::{AnalyzerError, Result};
use nuget_core::CacheConfig;
use nuget_resolver::{DEFAULT_FRAMEWORK_SERVICE_URL, DEFAULT_SERVICE_INDEX_URL};
use serde::Deserialize;
use std::path::Path;

/// Root configuration of the analyzer.
///
/// Loaded from an optional JSON file; every field falls back to a default.
///
/// # Examples
///
/// ```
/// use nuget_analyzer::config::{AnalyzerConfig, FrameworkResolution};
///
/// let json = r#"{
///     "service_index_urls": ["https://nuget.example.com/v3/index.json"],
///     "framework_resolution": "exact",
///     "cache": { "timeout_secs": 10 }
/// }"#;
///
/// let config: AnalyzerConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.framework_resolution, FrameworkResolution::Exact);
/// assert_eq!(config.cache.timeout_secs, 10);
/// assert!(config.include_dev_dependencies);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_service_index_urls")]
    pub service_index_urls: Vec<String>,
    #[serde(default = "default_framework_service_url")]
    pub framework_service_url: String,
    #[serde(default)]
    pub framework_resolution: FrameworkResolution,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_true")]
    pub include_dev_dependencies: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            service_index_urls: default_service_index_urls(),
            framework_service_url: default_framework_service_url(),
            framework_resolution: FrameworkResolution::default(),
            cache: CacheConfig::default(),
            include_dev_dependencies: true,
        }
    }
}

impl AnalyzerConfig {
    /// Loads the configuration file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyzerError::Io` if the file cannot be read and
    /// `AnalyzerError::Config` if it is not valid configuration JSON.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|source| AnalyzerError::Config {
            path: path.display().to_string(),
            source,
        })
    }
}

/// How the nearest target framework of a dependency group is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkResolution {
    /// Ask the remote nearest-framework service.
    #[default]
    Service,
    /// Match framework names locally.
    Exact,
}

fn default_service_index_urls() -> Vec<String> {
    vec![DEFAULT_SERVICE_INDEX_URL.to_string()]
}

fn default_framework_service_url() -> String {
    DEFAULT_FRAMEWORK_SERVICE_URL.to_string()
}

const fn default_true() -> bool {
    true
}
