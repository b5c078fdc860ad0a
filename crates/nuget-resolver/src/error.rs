//! Errors specific to NuGet registry access and dependency resolution.

use thiserror::Error;

/// Errors raised by the registry client, the range engine and the
/// definition-file readers.
///
/// Constraint conflicts are not errors: they are recorded as
/// [`nuget_core::Issue`] values and resolution continues.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// At least one service index could not be fetched or decoded
    #[error("NuGet registry unavailable at {url}: {source}")]
    RegistryUnavailable {
        url: String,
        #[source]
        source: Box<nuget_core::NugetError>,
    },

    /// None of the service indexes declares a registrations base URL
    #[error("no registrations base URL found in service indexes {urls:?}")]
    NoRegistrationsBaseUrl { urls: Vec<String> },

    /// Every registrations base URL failed for a package
    #[error("no registration catalog for '{package}' at any of {tried:?}")]
    CatalogNotFound { package: String, tried: Vec<String> },

    /// The catalog of a package does not list the requested version
    #[error("version '{version}' of '{package}' not found in its catalog")]
    VersionNotFound { package: String, version: String },

    /// Version text with no usable content
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// Version range text that does not follow the interval notation
    #[error("malformed version range '{range}': {message}")]
    MalformedRange { range: String, message: String },

    /// Failed to parse an XML document (package spec or definition file)
    #[error("failed to parse XML document {document}: {message}")]
    Xml { document: String, message: String },

    /// Definition file that no reader understands
    #[error("unsupported definition file: {0}")]
    UnsupportedDefinitionFile(String),

    #[error("failed to parse registry response from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] nuget_core::NugetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

impl ResolverError {
    pub fn malformed_range(range: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRange {
            range: range.into(),
            message: message.into(),
        }
    }

    pub fn xml(document: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Xml {
            document: document.into(),
            message: error.to_string(),
        }
    }

    pub fn json(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            url: url.into(),
            source,
        }
    }
}

/// Convert to nuget_core::NugetError for interoperability
impl From<ResolverError> for nuget_core::NugetError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::Transport(e) => e,
            ResolverError::Io(e) => nuget_core::NugetError::Io(e),
            ResolverError::Json { source, .. } => nuget_core::NugetError::Json(source),
            other => nuget_core::NugetError::CacheError(other.to_string()),
        }
    }
}
