//! Core abstractions for nuget-graph.
//!
//! This crate provides the ecosystem-neutral building blocks used by the
//! NuGet resolver and the analyzer binary.
//!
//! # Architecture
//!
//! nuget-core defines:
//! - **HTTP Cache**: registry transport with a 7-day freshness window and
//!   ETag/Last-Modified revalidation afterwards
//! - **Memo Cache**: atomic get-or-populate memoization keyed by immutable
//!   identifiers
//! - **Model**: identifiers, issues, package references, scopes and the
//!   records of an analysis result
//! - **Error Types**: transport and decoding errors

pub mod cache;
pub mod error;
pub mod memo;
pub mod model;

// Re-export commonly used types
pub use cache::{CacheConfig, CachedResponse, HttpCache};
pub use error::{NugetError, Result};
pub use memo::MemoCache;
pub use model::{
    AnalysisResult, Hash, Issue, NUGET_ECOSYSTEM, Package, PackageIdentifier, PackageReference,
    Project, RemoteArtifact, Scope, Severity, VcsInfo,
};
