use thiserror::Error;

/// Errors that abort an analyzer run.
///
/// Resolution problems that only affect single packages never end up here;
/// they are issues in the analysis result.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("failed to parse configuration {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write analysis result: {0}")]
    Output(#[source] serde_json::Error),

    #[error(transparent)]
    Resolver(#[from] nuget_resolver::ResolverError),

    #[error(transparent)]
    Transport(#[from] nuget_core::NugetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, AnalyzerError>`.
pub type Result<T> = std::result::Result<T, AnalyzerError>;
