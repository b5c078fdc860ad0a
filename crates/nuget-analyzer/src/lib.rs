//! Command line analyzer for NuGet dependencies of .NET projects.
//!
//! Wires the configuration to the resolver: builds the HTTP cache, connects
//! to the configured feeds, picks the framework lookup and analyzes one
//! definition file.

pub mod config;
pub mod error;

pub use config::{AnalyzerConfig, FrameworkResolution};
pub use error::{AnalyzerError, Result};

use nuget_core::{AnalysisResult, HttpCache};
use nuget_resolver::{
    Analyzer, ExactFrameworkMatch, FrameworkCompatibility, FrameworkService, RegistryClient,
};
use std::path::Path;
use std::sync::Arc;

/// Analyzes `definition_file` with the given configuration.
pub async fn run(definition_file: &Path, config: &AnalyzerConfig) -> Result<AnalysisResult> {
    let cache = Arc::new(HttpCache::with_config(&config.cache)?);
    let registry = RegistryClient::initialize(Arc::clone(&cache), &config.service_index_urls).await?;

    let frameworks: Arc<dyn FrameworkCompatibility> = match config.framework_resolution {
        FrameworkResolution::Service => Arc::new(FrameworkService::new(
            cache,
            config.framework_service_url.clone(),
        )),
        FrameworkResolution::Exact => Arc::new(ExactFrameworkMatch),
    };

    let analyzer = Analyzer::new(Arc::new(registry), frameworks)
        .include_dev_dependencies(config.include_dev_dependencies);

    let result = analyzer.analyze(definition_file).await?;
    tracing::info!(
        "resolved {} packages with {} issues",
        result.packages.len(),
        result.issues.len()
    );
    Ok(result)
}

/// Serializes an analysis result as JSON.
pub fn render(result: &AnalysisResult, compact: bool) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(result)
    } else {
        serde_json::to_string_pretty(result)
    };
    rendered.map_err(AnalyzerError::Output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuget_resolver::assemble_project;

    #[test]
    fn test_render_compact_and_pretty() {
        let result = AnalysisResult {
            project: assemble_project(Path::new("App.csproj"), Vec::new()),
            packages: Vec::new(),
            issues: Vec::new(),
        };

        let compact = render(&result, true).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.contains(r#""name":"App""#));

        let pretty = render(&result, false).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[tokio::test]
    async fn test_run_fails_for_invalid_feed_url() {
        let config = AnalyzerConfig {
            service_index_urls: vec!["ftp://feed.invalid/index.json".to_string()],
            ..AnalyzerConfig::default()
        };

        let result = run(Path::new("App.csproj"), &config).await;
        assert!(matches!(
            result,
            Err(AnalyzerError::Resolver(
                nuget_resolver::ResolverError::RegistryUnavailable { .. }
            ))
        ));
    }
}
